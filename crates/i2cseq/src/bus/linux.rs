//! Linux `i2c-dev` device handle and transport
//!
//! Opens `/dev/i2c-N`, checks the adapter can do plain I2C transfers, and
//! executes transactions with the `I2C_RDWR` ioctl, which issues all messages
//! between a single START and STOP.

#![allow(unsafe_code)]

use std::{
    fs::{File, OpenOptions},
    io,
    os::fd::{AsRawFd, IntoRawFd},
    path::{Path, PathBuf},
};

use log::{debug, trace};
use thiserror::Error;

use super::{BusError, BusTransport, Message, Operation, device_path};

// Request codes and flags from <linux/i2c-dev.h> and <linux/i2c.h>
const I2C_FUNCS: libc::c_ulong = 0x0705;
const I2C_RDWR: libc::c_ulong = 0x0707;
const I2C_FUNC_I2C: libc::c_ulong = 0x0000_0001;
const I2C_M_RD: u16 = 0x0001;

/// `I2C_RDWR_IOCTL_MAX_MSGS`
pub const MAX_MESSAGES: usize = 42;

/// `struct i2c_msg`
#[repr(C)]
#[derive(Debug)]
struct I2cMsg {
    addr: u16,
    flags: u16,
    len: u16,
    buf: *mut u8,
}

/// `struct i2c_rdwr_ioctl_data`
#[repr(C)]
#[derive(Debug)]
struct I2cRdwrIoctlData {
    msgs: *mut I2cMsg,
    nmsgs: u32,
}

#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("failed to open {}: {source}", path.display())]
    Open { path: PathBuf, source: io::Error },

    #[error("failed to query adapter functionality of {}: {source}", path.display())]
    Functionality { path: PathBuf, source: io::Error },

    #[error("{} does not support plain I2C transfers", path.display())]
    NotI2c { path: PathBuf },
}

/// An open I2C bus device node
#[derive(Debug)]
pub struct I2cDevice {
    file: File,
    path: PathBuf,
}

impl I2cDevice {
    /// Open `/dev/i2c-<bus>`
    pub fn open(bus: u8) -> Result<Self, DeviceError> {
        Self::open_path(device_path(bus))
    }

    /// Open an explicit device node and verify it speaks plain I2C
    pub fn open_path(path: impl AsRef<Path>) -> Result<Self, DeviceError> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&path)
            .map_err(|source| DeviceError::Open {
                path: path.clone(),
                source,
            })?;

        let device = Self { file, path };
        let funcs = device
            .functionality()
            .map_err(|source| DeviceError::Functionality {
                path: device.path.clone(),
                source,
            })?;
        if funcs & I2C_FUNC_I2C == 0 {
            return Err(DeviceError::NotI2c { path: device.path });
        }

        debug!("Opened {} (functionality 0x{funcs:08x})", device.path.display());
        Ok(device)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Adapter functionality bitmask (`I2C_FUNCS`)
    pub fn functionality(&self) -> io::Result<libc::c_ulong> {
        let mut funcs: libc::c_ulong = 0;
        // SAFETY: fd is valid for the lifetime of self, funcs outlives the call
        let ret = unsafe {
            libc::ioctl(
                self.file.as_raw_fd(),
                I2C_FUNCS as _,
                &raw mut funcs,
            )
        };
        if ret < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(funcs)
    }

    /// Close the device, reporting any error from `close(2)`
    pub fn close(self) -> io::Result<()> {
        let fd = self.file.into_raw_fd();
        // SAFETY: fd was just released from the File, so we own it
        let ret = unsafe { libc::close(fd) };
        if ret < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }
}

impl BusTransport for I2cDevice {
    fn transfer(&mut self, messages: &mut [Message<'_>]) -> Result<usize, BusError> {
        if messages.len() > MAX_MESSAGES {
            return Err(BusError::TooManyMessages {
                count: messages.len(),
                max: MAX_MESSAGES,
            });
        }

        let mut raw = messages
            .iter_mut()
            .enumerate()
            .map(|(index, message)| raw_message(index, message))
            .collect::<Result<Vec<_>, _>>()?;

        let mut data = I2cRdwrIoctlData {
            msgs: raw.as_mut_ptr(),
            nmsgs: raw.len() as u32,
        };

        trace!("I2C_RDWR on {} with {} message(s)", self.path.display(), raw.len());

        // SAFETY: every msg buffer points into a slice borrowed from `messages`
        // with at least `len` bytes, and the kernel only writes through
        // buffers flagged I2C_M_RD, which come from `&mut [u8]`.
        let ret = unsafe {
            libc::ioctl(
                self.file.as_raw_fd(),
                I2C_RDWR as _,
                &raw mut data,
            )
        };
        if ret < 0 {
            return Err(io::Error::last_os_error().into());
        }

        Ok(ret as usize)
    }
}

fn raw_message(index: usize, message: &mut Message<'_>) -> Result<I2cMsg, BusError> {
    let len = message.len();
    let len = u16::try_from(len).map_err(|_| BusError::MessageTooLong { index, len })?;
    let (flags, buf) = match &mut message.op {
        Operation::Write(bytes) => (0, bytes.as_ptr().cast_mut()),
        Operation::Read(buffer) => (I2C_M_RD, buffer.as_mut_ptr()),
    };
    Ok(I2cMsg {
        addr: u16::from(message.address.get()),
        flags,
        len,
        buf,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_path() {
        assert_eq!(device_path(1), PathBuf::from("/dev/i2c-1"));
        assert_eq!(device_path(12), PathBuf::from("/dev/i2c-12"));
    }

    #[test]
    fn test_open_missing_node() {
        let err = I2cDevice::open_path("/nonexistent/i2c-99").unwrap_err();
        assert!(matches!(err, DeviceError::Open { .. }), "{err}");
    }

    #[test]
    fn test_open_rejects_non_i2c_node() {
        // /dev/null opens fine but does not answer I2C_FUNCS
        let err = I2cDevice::open_path("/dev/null").unwrap_err();
        assert!(matches!(err, DeviceError::Functionality { .. }), "{err}");
    }

    #[test]
    fn test_open_missing_bus_number() {
        let err = I2cDevice::open(255).unwrap_err();
        match err {
            DeviceError::Open { path, .. } => assert_eq!(path, PathBuf::from("/dev/i2c-255")),
            other => panic!("expected an open failure, got {other}"),
        }
    }

    /// A handle over /dev/null, skipping the adapter check
    fn null_device() -> I2cDevice {
        let path = PathBuf::from("/dev/null");
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&path)
            .expect("/dev/null should open");
        I2cDevice { file, path }
    }

    #[test]
    fn test_close_releases_handle() {
        let device = null_device();
        assert_eq!(device.path(), Path::new("/dev/null"));
        device.close().unwrap();
    }

    #[test]
    fn test_transfer_limits_are_checked_before_the_ioctl() {
        let mut device = null_device();
        let address = crate::token::Address::new(0x1c).unwrap();

        let mut messages: Vec<Message<'_>> = (0..=MAX_MESSAGES)
            .map(|_| Message {
                address,
                op: Operation::Write(&[0x00]),
            })
            .collect();
        assert!(matches!(
            device.transfer(&mut messages),
            Err(BusError::TooManyMessages { count: 43, max: 42 })
        ));

        let long = vec![0; usize::from(u16::MAX) + 1];
        let mut messages = [Message {
            address,
            op: Operation::Write(&long),
        }];
        assert!(matches!(
            device.transfer(&mut messages),
            Err(BusError::MessageTooLong { index: 0, len: 65536 })
        ));
    }
}
