//! pigpio daemon client.
//!
//! Speaks the pigpiod socket protocol: every request is four little-endian
//! `u32` words `{cmd, p1, p2, p3}` followed by `p3` extension bytes, and every
//! reply is four words whose last one is the signed result. A negative result
//! is a pigpio error code.
//!
//! The client is the only owner of its socket; dropping it closes the
//! connection, which also releases any resources pigpiod tracked for it.

use anyhow::{anyhow, Context, Result};
use std::io::{Read, Write};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::time::Duration;

use super::{PinMode, Pulse, PulseHardware};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(3);
const IO_TIMEOUT: Duration = Duration::from_secs(5);

pub(crate) const CMD_MODES: u32 = 0;
pub(crate) const CMD_WRITE: u32 = 4;
pub(crate) const CMD_SERVO: u32 = 8;
pub(crate) const CMD_WVCLR: u32 = 27;
pub(crate) const CMD_WVAG: u32 = 28;
pub(crate) const CMD_WVBSY: u32 = 32;
pub(crate) const CMD_WVHLT: u32 = 33;
pub(crate) const CMD_WVCRE: u32 = 49;
pub(crate) const CMD_WVCHA: u32 = 93;

/// pigpio mnemonic for a command code, for error messages.
fn command_name(cmd: u32) -> &'static str {
    match cmd {
        CMD_MODES => "MODES",
        CMD_WRITE => "WRITE",
        CMD_SERVO => "SERVO",
        CMD_WVCLR => "WVCLR",
        CMD_WVAG => "WVAG",
        CMD_WVBSY => "WVBSY",
        CMD_WVHLT => "WVHLT",
        CMD_WVCRE => "WVCRE",
        CMD_WVCHA => "WVCHA",
        _ => "unknown",
    }
}

/// Connection to a running `pigpiod`.
pub struct PigpiodClient {
    stream: TcpStream,
    address: String,
}

impl PigpiodClient {
    /// Connect to `host:port` (pigpiod listens on 8888 by default).
    pub fn connect(address: &str) -> Result<Self> {
        let addr = address
            .to_socket_addrs()
            .with_context(|| format!("resolve pigpio daemon address {}", address))?
            .next()
            .ok_or_else(|| anyhow!("pigpio daemon address {} did not resolve", address))?;
        let stream = TcpStream::connect_timeout(&addr, CONNECT_TIMEOUT)
            .with_context(|| format!("connect to pigpio daemon at {}", address))?;
        stream.set_nodelay(true)?;
        stream.set_read_timeout(Some(IO_TIMEOUT))?;
        stream.set_write_timeout(Some(IO_TIMEOUT))?;
        log::info!("PigpiodClient: connected to {}", address);
        Ok(Self {
            stream,
            address: address.to_string(),
        })
    }

    fn command(&mut self, cmd: u32, p1: u32, p2: u32, extension: &[u8]) -> Result<i32> {
        let mut request = Vec::with_capacity(16 + extension.len());
        for word in [cmd, p1, p2, extension.len() as u32] {
            request.extend_from_slice(&word.to_le_bytes());
        }
        request.extend_from_slice(extension);
        let name = command_name(cmd);
        self.stream
            .write_all(&request)
            .with_context(|| format!("send pigpio {} to {}", name, self.address))?;

        let mut reply = [0u8; 16];
        self.stream
            .read_exact(&mut reply)
            .with_context(|| format!("read pigpio reply for {}", name))?;
        let result = i32::from_le_bytes([reply[12], reply[13], reply[14], reply[15]]);
        if result < 0 {
            return Err(anyhow!(
                "pigpio {} (command {}) failed with error code {}",
                name,
                cmd,
                result
            ));
        }
        Ok(result)
    }
}

impl PulseHardware for PigpiodClient {
    fn name(&self) -> &'static str {
        "pigpiod"
    }

    fn set_pin_mode(&mut self, pin: u32, mode: PinMode) -> Result<()> {
        self.command(CMD_MODES, pin, mode.code(), &[])?;
        Ok(())
    }

    fn write_pin(&mut self, pin: u32, high: bool) -> Result<()> {
        self.command(CMD_WRITE, pin, u32::from(high), &[])?;
        Ok(())
    }

    fn wave_clear(&mut self) -> Result<()> {
        self.command(CMD_WVCLR, 0, 0, &[])?;
        Ok(())
    }

    fn wave_add_generic(&mut self, pulses: &[Pulse]) -> Result<()> {
        let mut extension = Vec::with_capacity(pulses.len() * 12);
        for pulse in pulses {
            extension.extend_from_slice(&pulse.gpio_on.to_le_bytes());
            extension.extend_from_slice(&pulse.gpio_off.to_le_bytes());
            extension.extend_from_slice(&pulse.delay_us.to_le_bytes());
        }
        self.command(CMD_WVAG, 0, 0, &extension)?;
        Ok(())
    }

    fn wave_create(&mut self) -> Result<u32> {
        let id = self.command(CMD_WVCRE, 0, 0, &[])?;
        Ok(id as u32)
    }

    fn wave_chain(&mut self, chain: &[u8]) -> Result<()> {
        self.command(CMD_WVCHA, 0, 0, chain)?;
        Ok(())
    }

    fn wave_tx_busy(&mut self) -> Result<bool> {
        Ok(self.command(CMD_WVBSY, 0, 0, &[])? == 1)
    }

    fn wave_tx_stop(&mut self) -> Result<()> {
        self.command(CMD_WVHLT, 0, 0, &[])?;
        Ok(())
    }

    fn set_servo_pulsewidth(&mut self, pin: u32, pulse_us: u32) -> Result<()> {
        self.command(CMD_SERVO, pin, pulse_us, &[])?;
        Ok(())
    }
}

impl Drop for PigpiodClient {
    fn drop(&mut self) {
        let _ = self.stream.shutdown(Shutdown::Both);
        log::debug!("PigpiodClient: disconnected from {}", self.address);
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
