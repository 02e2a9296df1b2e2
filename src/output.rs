//! Output routing and raw-byte pretty printing for the CLI commands.

use std::fmt::Write as _;
use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Local;

/// Where command output goes: stdout by default, a file when the user
/// asked for one. A path naming an existing directory gets a timestamped
/// file inside it.
pub enum Output {
    Stdout(io::Stdout),
    File(PathBuf, File),
}

impl Output {
    pub fn create(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Output::Stdout(io::stdout()));
        };

        let path = if path.is_dir() {
            let stamp = Local::now().format("%Y%m%d_%H%M%S");
            path.join(format!("{stamp}_hid.txt"))
        } else {
            path.to_path_buf()
        };

        let file =
            File::create(&path).with_context(|| format!("cannot create {}", path.display()))?;

        Ok(Output::File(path, file))
    }

    /// The file the output goes to, if any.
    pub fn path(&self) -> Option<&Path> {
        match self {
            Output::Stdout(_) => None,
            Output::File(path, _) => Some(path),
        }
    }
}

impl Write for Output {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Output::Stdout(stdout) => stdout.write(buf),
            Output::File(_, file) => file.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Output::Stdout(stdout) => stdout.flush(),
            Output::File(_, file) => file.flush(),
        }
    }
}

/// Classic 16-bytes-per-line hex dump with an offset column.
pub fn hexdump(bytes: &[u8]) -> String {
    let mut out = String::new();

    for (row, chunk) in bytes.chunks(16).enumerate() {
        let _ = write!(out, "{:04x}:", row * 16);
        for byte in chunk {
            let _ = write!(out, " {byte:02x}");
        }
        out.push('\n');
    }

    out
}

#[cfg(test)]
mod test {
    use super::hexdump;

    #[test]
    fn dumps_bytes_in_rows_of_sixteen() {
        let bytes: Vec<u8> = (0..18).collect();

        let expected = "\
0000: 00 01 02 03 04 05 06 07 08 09 0a 0b 0c 0d 0e 0f
0010: 10 11
";
        assert_eq!(hexdump(&bytes), expected);
    }

    #[test]
    fn dumps_nothing_for_no_bytes() {
        assert_eq!(hexdump(&[]), "");
    }
}
