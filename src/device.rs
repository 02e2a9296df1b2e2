//! hidraw character-device transport.
//!
//! Everything here goes through the kernel's hidraw ioctl interface;
//! decoding the descriptor is the hid-parser crate's job.

use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::os::fd::AsRawFd;
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;

use hid_parser::{HidError, ReportDescriptor, Result};

// From linux/hidraw.h
const HID_MAX_DESCRIPTOR_SIZE: usize = 4096;
const HID_STRING_SIZE: usize = 256;

#[repr(C)]
pub struct HidrawDescriptorBuf {
    size: u32,
    value: [u8; HID_MAX_DESCRIPTOR_SIZE],
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct DeviceInfo {
    pub bustype: u32,
    pub vendor: i16,
    pub product: i16,
}

nix::ioctl_read!(hidraw_ioc_grdescsize, b'H', 0x01, libc::c_int);
nix::ioctl_read!(hidraw_ioc_grdesc, b'H', 0x02, HidrawDescriptorBuf);
nix::ioctl_read!(hidraw_ioc_grawinfo, b'H', 0x03, DeviceInfo);
nix::ioctl_read_buf!(hidraw_ioc_grawname, b'H', 0x04, u8);
nix::ioctl_read_buf!(hidraw_ioc_grawphys, b'H', 0x05, u8);
nix::ioctl_readwrite_buf!(hidraw_ioc_sfeature, b'H', 0x06, u8);
nix::ioctl_readwrite_buf!(hidraw_ioc_gfeature, b'H', 0x07, u8);

fn io_error(op: &'static str, errno: nix::errno::Errno) -> HidError {
    HidError::Io {
        op,
        source: std::io::Error::from_raw_os_error(errno as i32),
    }
}

pub struct Device {
    file: File,
}

impl Device {
    pub fn open(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(libc::O_CLOEXEC)
            .open(path)
            .map_err(|source| HidError::Io { op: "open", source })?;

        Ok(Device { file })
    }

    /// Fetch the report descriptor: one call for the length, another for
    /// the bytes.
    pub fn report_descriptor(&self) -> Result<ReportDescriptor> {
        let fd = self.file.as_raw_fd();

        let mut size: libc::c_int = 0;
        unsafe { hidraw_ioc_grdescsize(fd, &mut size) }
            .map_err(|errno| io_error("HIDIOCGRDESCSIZE", errno))?;

        let mut buf = HidrawDescriptorBuf {
            size: size as u32,
            value: [0; HID_MAX_DESCRIPTOR_SIZE],
        };
        unsafe { hidraw_ioc_grdesc(fd, &mut buf) }
            .map_err(|errno| io_error("HIDIOCGRDESC", errno))?;

        let len = (buf.size as usize).min(HID_MAX_DESCRIPTOR_SIZE);

        Ok(ReportDescriptor::new(buf.value[..len].to_vec()))
    }

    pub fn name(&self) -> Result<String> {
        let mut buf = [0u8; HID_STRING_SIZE];
        unsafe { hidraw_ioc_grawname(self.file.as_raw_fd(), &mut buf) }
            .map_err(|errno| io_error("HIDIOCGRAWNAME", errno))?;

        Ok(c_string(&buf))
    }

    pub fn physical_address(&self) -> Result<String> {
        let mut buf = [0u8; HID_STRING_SIZE];
        unsafe { hidraw_ioc_grawphys(self.file.as_raw_fd(), &mut buf) }
            .map_err(|errno| io_error("HIDIOCGRAWPHYS", errno))?;

        Ok(c_string(&buf))
    }

    pub fn info(&self) -> Result<DeviceInfo> {
        let mut info = DeviceInfo::default();
        unsafe { hidraw_ioc_grawinfo(self.file.as_raw_fd(), &mut info) }
            .map_err(|errno| io_error("HIDIOCGRAWINFO", errno))?;

        Ok(info)
    }

    /// Fetch a feature report. The first byte of `buf` names the Report
    /// ID (0 when the device uses none); the kernel fills in the rest.
    pub fn get_feature_report(&self, buf: &mut [u8]) -> Result<usize> {
        if buf.is_empty() {
            return Err(HidError::InvalidArgument(
                "empty feature report buffer".into(),
            ));
        }

        let got = unsafe { hidraw_ioc_gfeature(self.file.as_raw_fd(), buf) }
            .map_err(|errno| io_error("HIDIOCGFEATURE", errno))? as usize;

        if got < buf.len() {
            return Err(HidError::ProtocolShort {
                op: "HIDIOCGFEATURE",
                want: buf.len(),
                got,
            });
        }

        Ok(got)
    }

    /// Send a feature report; the whole buffer, Report ID first, goes to
    /// the device.
    pub fn send_feature_report(&self, buf: &[u8]) -> Result<()> {
        if buf.is_empty() {
            return Err(HidError::InvalidArgument(
                "empty feature report buffer".into(),
            ));
        }

        // HIDIOCSFEATURE is declared read-write, the kernel does not
        // actually write back
        let mut copy = buf.to_vec();
        let sent = unsafe { hidraw_ioc_sfeature(self.file.as_raw_fd(), &mut copy) }
            .map_err(|errno| io_error("HIDIOCSFEATURE", errno))? as usize;

        if sent < buf.len() {
            return Err(HidError::ProtocolShort {
                op: "HIDIOCSFEATURE",
                want: buf.len(),
                got: sent,
            });
        }

        Ok(())
    }

    /// Write one output report. The first byte must be the Report ID, 0
    /// when the device does not use IDs.
    pub fn write_report(&mut self, buf: &[u8]) -> Result<usize> {
        if buf.is_empty() {
            return Err(HidError::InvalidArgument("empty report".into()));
        }

        self.file
            .write(buf)
            .map_err(|source| HidError::Io { op: "write", source })
    }

    /// Block until one input report arrives.
    pub fn read_report(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.file
            .read(buf)
            .map_err(|source| HidError::Io { op: "read", source })
    }
}

/// Kernel strings come back NUL-terminated in a fixed buffer.
fn c_string(buf: &[u8]) -> String {
    let end = buf.iter().position(|&byte| byte == 0).unwrap_or(buf.len());

    String::from_utf8_lossy(&buf[..end]).into_owned()
}
