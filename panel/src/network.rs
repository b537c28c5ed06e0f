//! Wireless link control.

use std::fmt::Debug;
use std::io;
use std::io::Write;
use std::process::{Command, Stdio};
use log::debug;

/// The radio and association state the submission client needs.
pub trait NetworkLink: Debug {
    /// Whether the link is up and usable.
    fn is_connected(&mut self) -> io::Result<bool>;
    /// Powers the radio on or off.
    fn set_active(&mut self, active: bool) -> io::Result<()>;
    /// Starts associating with the network. Doesn't wait for it to finish.
    fn connect(&mut self, ssid: &str, password: &str) -> io::Result<()>;
}

/// Drives NetworkManager through its `nmcli` command line tool.
#[derive(Debug, Default)]
pub struct NmcliLink {
    /// Wireless interface to use, e.g. `wlan0`. NetworkManager picks one when unset.
    pub interface: Option<String>,
}

impl NmcliLink {
    pub fn new(interface: Option<String>) -> Self {
        NmcliLink { interface }
    }

    /// Runs nmcli, feeding `input` as one line on stdin for its prompts.
    fn nmcli(args: &[&str], input: Option<&str>) -> io::Result<String> {
        let mut child = Command::new("nmcli")
            .args(args)
            .stdin(if input.is_some() { Stdio::piped() } else { Stdio::null() })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        let written = match (input, child.stdin.take()) {
            (Some(input), Some(mut stdin)) => writeln!(stdin, "{}", input),
            _ => Ok(()),
        };
        let output = child.wait_with_output()?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(io::Error::other(format!("nmcli failed: {}", stderr.trim())));
        }
        // nmcli exits without reading when it already has the secrets.
        match written {
            Err(e) if e.kind() != io::ErrorKind::BrokenPipe => return Err(e),
            _ => {}
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    fn connect_args<'s>(&'s self, ssid: &'s str) -> Vec<&'s str> {
        let mut args = vec!["--ask", "--wait", "0", "device", "wifi", "connect", ssid];
        if let Some(interface) = &self.interface {
            args.extend(["ifname", interface.as_str()]);
        }
        args
    }
}

/// Whether `nmcli -t -f DEVICE,TYPE,STATE device` lists a connected wifi device,
/// `interface` if given. Wired links don't count.
fn wifi_connected(devices: &str, interface: Option<&str>) -> bool {
    devices.lines().any(|line| {
        let mut fields = line.splitn(3, ':');
        let (Some(device), Some(kind), Some(state)) = (fields.next(), fields.next(), fields.next()) else {
            return false;
        };
        kind == "wifi"
            && state.trim() == "connected"
            && interface.is_none_or(|interface| interface == device)
    })
}

impl NetworkLink for NmcliLink {
    fn is_connected(&mut self) -> io::Result<bool> {
        let devices = Self::nmcli(&["-t", "-f", "DEVICE,TYPE,STATE", "device"], None)?;
        Ok(wifi_connected(&devices, self.interface.as_deref()))
    }

    fn set_active(&mut self, active: bool) -> io::Result<()> {
        debug!("Turning the radio {}.", if active { "on" } else { "off" });
        Self::nmcli(&["radio", "wifi", if active { "on" } else { "off" }], None)?;
        Ok(())
    }

    fn connect(&mut self, ssid: &str, password: &str) -> io::Result<()> {
        debug!("Connecting to {:?}.", ssid);
        Self::nmcli(&self.connect_args(ssid), Some(password))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEVICES: &str = "\
eth0:ethernet:connected
wlan0:wifi:disconnected
p2p-dev-wlan0:wifi-p2p:disconnected
lo:loopback:connected (externally)
";

    #[test]
    fn wired_link_is_not_wifi() {
        assert!(!wifi_connected(DEVICES, None));
    }

    #[test]
    fn connected_wifi_device_counts() {
        let devices = DEVICES.replace("wlan0:wifi:disconnected", "wlan0:wifi:connected");

        assert!(wifi_connected(&devices, None));
        assert!(wifi_connected(&devices, Some("wlan0")));
        assert!(!wifi_connected(&devices, Some("wlan1")));
    }

    #[test]
    fn connecting_is_not_connected() {
        assert!(!wifi_connected("wlan0:wifi:connecting (getting IP configuration)\n", None));
    }

    #[test]
    fn password_stays_off_the_command_line() {
        let link = NmcliLink::new(Some("wlan0".into()));

        let args = link.connect_args("space");

        assert_eq!(
            args,
            vec!["--ask", "--wait", "0", "device", "wifi", "connect", "space", "ifname", "wlan0"]
        );
    }
}
