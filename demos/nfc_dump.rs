// Copyright (c) 2018 The rust-gpio-cdev Project Developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use std::path::PathBuf;
use std::time::Duration;

use futures::StreamExt;
use pn547_cdev::linux::{self, LinuxConfig};
use pn547_cdev::{AsyncHandle, DeviceConfig, LineOffsets, OpenFlags, PowerState, MAX_TRANSFER_SIZE};
use structopt::StructOpt;

#[derive(Debug, StructOpt)]
struct Cli {
    /// The gpiochip device (e.g. /dev/gpiochip0)
    chip: PathBuf,
    /// The i2c-dev bus the controller sits on (e.g. /dev/i2c-1)
    bus: PathBuf,
    enable: u32,
    firmware_select: u32,
    data_ready: u32,
    /// Stop after this many seconds
    #[structopt(long, default_value = "10")]
    seconds: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Cli::from_args();
    let lines = LineOffsets {
        enable: args.enable,
        firmware_select: args.firmware_select,
        data_ready: args.data_ready,
    };

    let device = linux::open(
        DeviceConfig::new(lines),
        &LinuxConfig::new(&args.chip, &args.bus),
    )?;
    let nfc = AsyncHandle::new(device.open(OpenFlags::empty())?);
    nfc.set_power(PowerState::On).await?;
    // CORE_RESET_CMD, then CORE_INIT_CMD
    nfc.write(&[0x20, 0x00, 0x01, 0x01]).await?;

    let stopper = nfc.clone();
    let seconds = args.seconds;
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(seconds)).await;
        stopper.cancel_read();
    });

    let mut frames = Box::pin(nfc.frames(MAX_TRANSFER_SIZE));
    let mut sent_init = false;
    while let Some(frame) = frames.next().await {
        let frame = frame?;
        println!("{:02x?}", &frame[..]);
        if !sent_init {
            nfc.write(&[0x20, 0x01, 0x00]).await?;
            sent_init = true;
        }
    }

    nfc.set_power(PowerState::Off).await?;
    Ok(())
}
