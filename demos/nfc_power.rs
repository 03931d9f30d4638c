// Copyright (c) 2018 The rust-gpio-cdev Project Developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use std::path::PathBuf;

use anyhow::Context;
use pn547_cdev::linux::{self, LinuxConfig};
use pn547_cdev::{DeviceConfig, LineOffsets, MismatchPolicy, OpenFlags, PowerState};
use structopt::StructOpt;

#[derive(Debug, StructOpt)]
struct Cli {
    /// The gpiochip device (e.g. /dev/gpiochip0)
    chip: PathBuf,
    /// The i2c-dev bus the controller sits on (e.g. /dev/i2c-1)
    bus: PathBuf,
    /// Offset of the VEN line
    enable: u32,
    /// Offset of the firmware-download select line
    firmware_select: u32,
    /// Offset of the data-ready line
    data_ready: u32,
    /// Target state: off, on or firmware
    #[structopt(default_value = "on")]
    state: String,
    /// 7-bit bus address of the controller
    #[structopt(long, default_value = "40")]
    address: u16,
    /// Fail instead of warning when a power line does not read back
    #[structopt(long)]
    strict: bool,
}

fn parse_state(state: &str) -> anyhow::Result<PowerState> {
    match state {
        "off" => Ok(PowerState::Off),
        "on" => Ok(PowerState::On),
        "firmware" => Ok(PowerState::OnWithFirmwareDownload),
        other => anyhow::bail!("unknown power state {:?}", other),
    }
}

fn do_main(args: Cli) -> anyhow::Result<()> {
    let target = parse_state(&args.state)?;
    let lines = LineOffsets {
        enable: args.enable,
        firmware_select: args.firmware_select,
        data_ready: args.data_ready,
    };
    let policy = if args.strict {
        MismatchPolicy::Fail
    } else {
        MismatchPolicy::Log
    };

    let device = linux::open(
        DeviceConfig::new(lines).with_mismatch_policy(policy),
        &LinuxConfig::new(&args.chip, &args.bus).with_address(args.address),
    )
    .with_context(|| format!("attaching controller on {}", args.bus.display()))?;

    let nfc = device.open(OpenFlags::empty())?;
    nfc.set_power(target)?;
    println!("controller is now {:?}", nfc.power_state());

    if target == PowerState::On {
        // CORE_RESET_CMD, keep configuration
        nfc.write(&[0x20, 0x00, 0x01, 0x00])?;
        let response = nfc.read_frame()?;
        println!("CORE_RESET_RSP: {:02x?}", &response[..]);
    }

    Ok(())
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Cli::from_args();
    do_main(args).map_err(|e| {
        log::error!("{:?}", e);
        e
    })
}
