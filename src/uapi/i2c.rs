// Copyright (c) 2018 The rust-gpio-cdev Project Developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use nix::ioctl_write_int_bad;

/// `I2C_SLAVE` from `linux/i2c-dev.h`: bind the 7-bit target address used
/// by subsequent `read`/`write` calls on the fd.
const I2C_SLAVE: u16 = 0x0703;

/// Largest 7-bit address.
pub(crate) const I2C_ADDRESS_MAX: u16 = 0x7F;

ioctl_write_int_bad!(i2c_set_slave, I2C_SLAVE);
