use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use log::debug;

const SYSFS_GPIO_ROOT: &str = "/sys/class/gpio";

/// Low-level pin access for the magnet bank. Calls block, so callers run them on the
/// blocking pool.
pub trait MagnetDriver: Send + Sync + 'static {
    fn available(&self) -> bool;

    /// Makes every pin an output, released.
    fn prepare(&self, pins: &[u8]) -> Result<()>;

    fn set(&self, pin: u8, energized: bool) -> Result<()>;
}

/// Stand-in used on machines without GPIO. Only logs.
#[derive(Debug, Default, Clone, Copy)]
pub struct SimulatedDriver;

impl MagnetDriver for SimulatedDriver {
    fn available(&self) -> bool {
        false
    }

    fn prepare(&self, pins: &[u8]) -> Result<()> {
        debug!("[simulated] prepared magnet pins {pins:?}");
        Ok(())
    }

    fn set(&self, pin: u8, energized: bool) -> Result<()> {
        debug!(
            "[simulated] GPIO{pin} {}",
            if energized { "HIGH" } else { "LOW" }
        );
        Ok(())
    }
}

/// Drives pins through the kernel's sysfs GPIO interface (BCM numbering).
#[derive(Debug, Clone)]
pub struct SysfsDriver {
    root: PathBuf,
}

impl Default for SysfsDriver {
    fn default() -> Self {
        Self::new(SYSFS_GPIO_ROOT)
    }
}

impl SysfsDriver {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn pin_dir(&self, pin: u8) -> PathBuf {
        self.root.join(format!("gpio{pin}"))
    }
}

fn write_attr(path: &Path, value: &str) -> Result<()> {
    fs::write(path, value).with_context(|| format!("failed to write {}", path.display()))
}

impl MagnetDriver for SysfsDriver {
    fn available(&self) -> bool {
        self.root.is_dir()
    }

    fn prepare(&self, pins: &[u8]) -> Result<()> {
        for &pin in pins {
            if !self.pin_dir(pin).exists() {
                write_attr(&self.root.join("export"), &pin.to_string())?;
            }
            write_attr(&self.pin_dir(pin).join("direction"), "out")?;
            write_attr(&self.pin_dir(pin).join("value"), "0")?;
        }
        Ok(())
    }

    fn set(&self, pin: u8, energized: bool) -> Result<()> {
        write_attr(
            &self.pin_dir(pin).join("value"),
            if energized { "1" } else { "0" },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{
        env,
        time::{SystemTime, UNIX_EPOCH},
    };

    fn fake_sysfs(pins: &[u8]) -> PathBuf {
        let suffix = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos();
        let root = env::temp_dir().join(format!("flag_reaction_gpio_{suffix}"));
        for pin in pins {
            fs::create_dir_all(root.join(format!("gpio{pin}"))).expect("create pin dir");
        }
        root
    }

    #[test]
    fn sysfs_writes_direction_and_values() {
        let root = fake_sysfs(&[5, 6]);
        let driver = SysfsDriver::new(&root);
        assert!(driver.available());

        driver.prepare(&[5, 6]).unwrap();
        assert_eq!(fs::read_to_string(root.join("gpio5/direction")).unwrap(), "out");
        assert_eq!(fs::read_to_string(root.join("gpio6/value")).unwrap(), "0");

        driver.set(6, true).unwrap();
        assert_eq!(fs::read_to_string(root.join("gpio6/value")).unwrap(), "1");

        fs::remove_dir_all(root).expect("cleanup");
    }

    #[test]
    fn sysfs_reports_missing_root() {
        let driver = SysfsDriver::new("/definitely/not/a/gpio/root");
        assert!(!driver.available());
        assert!(driver.set(5, true).is_err());
    }
}
