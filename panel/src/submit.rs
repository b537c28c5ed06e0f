//! Sending a finished selection to the remote endpoint.

use std::fmt::Debug;
use std::thread::sleep;
use std::time::Duration;
use log::{debug, info, warn};
use presence_gpio::GpioError;
use thiserror::Error;
use crate::config::{NetworkConfig, Timing};
use crate::layout::LedRef;
use crate::leds::LedBank;
use crate::network::NetworkLink;
use crate::selection::SubmissionRecord;

#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("no network configured")]
    NotConfigured,
    #[error("not connected after {attempts} attempts")]
    ConnectTimeout { attempts: u32 },
    #[error("request timed out")]
    Timeout,
    #[error("connection refused")]
    Refused,
    #[error("server answered with status {0}")]
    BadStatus(u16),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("network link error: {0}")]
    Link(#[from] std::io::Error),
    #[error("LED error: {0}")]
    Gpio(#[from] GpioError),
}

/// Something that can deliver a record. The LEDs are lent for progress feedback.
pub trait Submitter {
    fn submit(&mut self, record: &SubmissionRecord, leds: &mut LedBank) -> Result<(), SubmitError>;
}

/// Sends a JSON body and reports the response status.
pub trait Transport: Debug {
    fn post(&self, url: &str, body: &serde_json::Value) -> Result<u16, SubmitError>;
}

/// [Transport] over a blocking HTTP client.
#[derive(Debug)]
pub struct HttpTransport {
    client: reqwest::blocking::Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self, SubmitError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SubmitError::Transport(e.to_string()))?;
        Ok(HttpTransport { client })
    }
}

impl From<reqwest::Error> for SubmitError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            SubmitError::Timeout
        } else if err.is_connect() {
            SubmitError::Refused
        } else {
            SubmitError::Transport(err.to_string())
        }
    }
}

impl Transport for HttpTransport {
    fn post(&self, url: &str, body: &serde_json::Value) -> Result<u16, SubmitError> {
        let response = self.client.post(url).json(body).send()?;
        Ok(response.status().as_u16())
    }
}

/// Brings the wireless link up when needed and posts the record.
#[derive(Debug)]
pub struct SubmissionClient {
    network: Option<NetworkConfig>,
    link: Box<dyn NetworkLink>,
    transport: Box<dyn Transport>,
    network_led: LedRef,
    network_led_state: bool,
    connect_attempts: u32,
    poll_interval: Duration,
    radio_settle: Duration,
}

impl SubmissionClient {
    pub fn new(
        network: Option<NetworkConfig>,
        link: Box<dyn NetworkLink>,
        transport: Box<dyn Transport>,
        network_led: LedRef,
        timing: &Timing,
    ) -> Self {
        let connect_attempts = if timing.connect_attempts == 0 {
            warn!("connect_attempts is 0, polling the link once instead.");
            1
        } else {
            timing.connect_attempts
        };

        SubmissionClient {
            network,
            link,
            transport,
            network_led,
            network_led_state: false,
            connect_attempts,
            poll_interval: timing.poll_interval(),
            radio_settle: timing.radio_settle(),
        }
    }

    /// Power-cycles the radio, starts associating and polls until connected or out of attempts.
    ///
    /// The network LED flips on every poll.
    fn bring_up(&mut self, network: &NetworkConfig, leds: &mut LedBank) -> Result<(), SubmitError> {
        info!("Bringing the wireless link up...");
        self.link.set_active(false)?;
        sleep(self.radio_settle);
        self.link.set_active(true)?;
        self.link.connect(&network.ssid, &network.password)?;

        for attempt in 1..=self.connect_attempts {
            sleep(self.poll_interval);
            leds.toggle(self.network_led, &mut self.network_led_state);
            leds.flush()?;
            if self.link.is_connected()? {
                info!("Connected after {} attempt(s).", attempt);
                return Ok(());
            }
            debug!("Not connected yet ({}/{}).", attempt, self.connect_attempts);
        }

        Err(SubmitError::ConnectTimeout {
            attempts: self.connect_attempts,
        })
    }

    /// Turns the radio off so it doesn't disturb the touch controller.
    fn power_down(&mut self) {
        if let Err(e) = self.link.set_active(false) {
            warn!("Couldn't turn the radio off: {}", e);
        }
    }

    /// Runs `f` with the link up. The radio is always off again afterwards, even if it
    /// was already connected.
    fn with_link<T>(
        &mut self,
        leds: &mut LedBank,
        f: impl FnOnce(&mut Self, &NetworkConfig, &mut LedBank) -> Result<T, SubmitError>,
    ) -> Result<T, SubmitError> {
        let network = self.network.clone().ok_or(SubmitError::NotConfigured)?;

        let result = match self.link.is_connected() {
            Ok(true) => f(self, &network, leds),
            Ok(false) => match self.bring_up(&network, leds) {
                Ok(()) => f(self, &network, leds),
                Err(e) => Err(e),
            },
            Err(e) => Err(e.into()),
        };
        self.power_down();
        result
    }

    /// Checks at startup that the configured network is reachable.
    pub fn check_connectivity(&mut self, leds: &mut LedBank) -> Result<(), SubmitError> {
        self.with_link(leds, |_, network, _| {
            info!("Network {:?} is reachable.", network.ssid);
            Ok(())
        })
    }
}

impl Submitter for SubmissionClient {
    fn submit(&mut self, record: &SubmissionRecord, leds: &mut LedBank) -> Result<(), SubmitError> {
        self.with_link(leds, |client, network, leds| {
            let payload = record
                .to_payload(&network.extra)
                .map_err(|e| SubmitError::Transport(e.to_string()))?;
            debug!("Posting {} to {}", payload, network.url);

            let status = client.transport.post(&network.url, &payload)?;
            if status != 200 {
                return Err(SubmitError::BadStatus(status));
            }

            info!("Submitted {:?}.", record);
            client.network_led_state = true;
            leds.switch(client.network_led, true);
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use presence_gpio::mock::RecordingChain;
    use std::cell::RefCell;
    use std::io;
    use std::rc::Rc;

    const NETWORK_LED: LedRef = LedRef::Dual(0, 1);

    #[derive(Debug, Default)]
    struct LinkLog {
        calls: Vec<String>,
        /// Connected once this many polls have been answered after `connect`.
        connect_after: Option<u32>,
        polls: u32,
        connecting: bool,
    }

    #[derive(Debug, Clone)]
    struct FakeLink(Rc<RefCell<LinkLog>>);

    impl NetworkLink for FakeLink {
        fn is_connected(&mut self) -> io::Result<bool> {
            let mut log = self.0.borrow_mut();
            if !log.connecting {
                return Ok(log.connect_after == Some(0));
            }
            log.polls += 1;
            Ok(log.connect_after.is_some_and(|n| log.polls >= n))
        }

        fn set_active(&mut self, active: bool) -> io::Result<()> {
            let mut log = self.0.borrow_mut();
            log.calls.push(format!("radio {}", if active { "on" } else { "off" }));
            if !active {
                log.connecting = false;
            }
            Ok(())
        }

        fn connect(&mut self, ssid: &str, _password: &str) -> io::Result<()> {
            let mut log = self.0.borrow_mut();
            log.calls.push(format!("connect {ssid}"));
            log.connecting = true;
            Ok(())
        }
    }

    #[derive(Debug)]
    struct FakeTransport {
        status: Result<u16, fn() -> SubmitError>,
        bodies: Rc<RefCell<Vec<(String, serde_json::Value)>>>,
    }

    impl Transport for FakeTransport {
        fn post(&self, url: &str, body: &serde_json::Value) -> Result<u16, SubmitError> {
            self.bodies.borrow_mut().push((url.to_string(), body.clone()));
            self.status.map_err(|make| make())
        }
    }

    fn network() -> NetworkConfig {
        NetworkConfig {
            ssid: "space".into(),
            password: "secret".into(),
            url: "http://panel.local/presence".into(),
            extra: serde_json::Map::new(),
        }
    }

    fn timing(attempts: u32) -> Timing {
        Timing {
            connect_attempts: attempts,
            poll_interval_ms: 0,
            radio_settle_ms: 0,
            ..Timing::default()
        }
    }

    struct Fixture {
        link: Rc<RefCell<LinkLog>>,
        bodies: Rc<RefCell<Vec<(String, serde_json::Value)>>>,
        client: SubmissionClient,
    }

    fn fixture(
        network: Option<NetworkConfig>,
        connect_after: Option<u32>,
        status: Result<u16, fn() -> SubmitError>,
        attempts: u32,
    ) -> Fixture {
        let link = Rc::new(RefCell::new(LinkLog {
            connect_after,
            ..LinkLog::default()
        }));
        let bodies = Rc::new(RefCell::new(Vec::new()));
        let client = SubmissionClient::new(
            network,
            Box::new(FakeLink(link.clone())),
            Box::new(FakeTransport {
                status,
                bodies: bodies.clone(),
            }),
            NETWORK_LED,
            &timing(attempts),
        );
        Fixture { link, bodies, client }
    }

    fn record() -> SubmissionRecord {
        SubmissionRecord {
            leaving: true,
            time: Some(0),
            guests: None,
            locations: vec![2],
        }
    }

    #[test]
    fn sends_right_away_when_connected() {
        let mut fx = fixture(Some(network()), Some(0), Ok(200), 3);
        let chain = RecordingChain::new();
        let mut leds = LedBank::new(&chain, 1);

        fx.client.submit(&record(), &mut leds).unwrap();

        assert_eq!(fx.link.borrow().calls, vec!["radio off"]);
        let bodies = fx.bodies.borrow();
        assert_eq!(bodies.len(), 1);
        assert_eq!(bodies[0].0, "http://panel.local/presence");
        assert_eq!(bodies[0].1["locations"], serde_json::json!([2]));
        assert_eq!(leds.shown(NETWORK_LED), Some(true));
    }

    #[test]
    fn reconnects_then_powers_radio_down() {
        let mut fx = fixture(Some(network()), Some(2), Ok(200), 5);
        let chain = RecordingChain::new();
        let mut leds = LedBank::new(&chain, 1);

        fx.client.submit(&record(), &mut leds).unwrap();

        assert_eq!(
            fx.link.borrow().calls,
            vec!["radio off", "radio on", "connect space", "radio off"]
        );
        assert_eq!(fx.link.borrow().polls, 2);
        assert_eq!(fx.bodies.borrow().len(), 1);
    }

    #[test]
    fn gives_up_after_attempt_budget() {
        let mut fx = fixture(Some(network()), None, Ok(200), 3);
        let chain = RecordingChain::new();
        let mut leds = LedBank::new(&chain, 1);

        let result = fx.client.submit(&record(), &mut leds);

        assert!(matches!(result, Err(SubmitError::ConnectTimeout { attempts: 3 })));
        assert_eq!(fx.link.borrow().polls, 3);
        assert!(fx.bodies.borrow().is_empty());
        // Three toggles: on, off, on.
        assert_eq!(chain.frame_count(), 3);
        assert_eq!(leds.shown(NETWORK_LED), Some(true));
    }

    #[test]
    fn non_ok_status_is_failure() {
        let mut fx = fixture(Some(network()), Some(0), Ok(500), 3);
        let chain = RecordingChain::new();
        let mut leds = LedBank::new(&chain, 1);

        let result = fx.client.submit(&record(), &mut leds);

        assert!(matches!(result, Err(SubmitError::BadStatus(500))));
    }

    #[test]
    fn transport_fault_is_failure() {
        let mut fx = fixture(Some(network()), Some(0), Err(|| SubmitError::Refused), 3);
        let chain = RecordingChain::new();
        let mut leds = LedBank::new(&chain, 1);

        let result = fx.client.submit(&record(), &mut leds);

        assert!(matches!(result, Err(SubmitError::Refused)));
        assert_eq!(leds.shown(NETWORK_LED), None);
    }

    #[test]
    fn unconfigured_network_always_fails() {
        let mut fx = fixture(None, Some(0), Ok(200), 3);
        let chain = RecordingChain::new();
        let mut leds = LedBank::new(&chain, 1);

        let result = fx.client.submit(&record(), &mut leds);

        assert!(matches!(result, Err(SubmitError::NotConfigured)));
        assert!(fx.bodies.borrow().is_empty());
    }

    #[test]
    fn extra_fields_are_sent() {
        let mut config = network();
        config.extra.insert("panel".into(), "door".into());
        let mut fx = fixture(Some(config), Some(0), Ok(200), 3);
        let chain = RecordingChain::new();
        let mut leds = LedBank::new(&chain, 1);

        fx.client.submit(&record(), &mut leds).unwrap();

        assert_eq!(fx.bodies.borrow()[0].1["panel"], "door");
    }

    #[test]
    fn startup_check_turns_a_connected_radio_off() {
        let mut fx = fixture(Some(network()), Some(0), Ok(200), 3);
        let chain = RecordingChain::new();
        let mut leds = LedBank::new(&chain, 1);

        fx.client.check_connectivity(&mut leds).unwrap();

        assert_eq!(fx.link.borrow().calls, vec!["radio off"]);
        assert!(fx.bodies.borrow().is_empty());
    }

    #[test]
    fn failed_post_still_turns_radio_off() {
        let mut fx = fixture(Some(network()), Some(0), Ok(503), 3);
        let chain = RecordingChain::new();
        let mut leds = LedBank::new(&chain, 1);

        let result = fx.client.submit(&record(), &mut leds);

        assert!(matches!(result, Err(SubmitError::BadStatus(503))));
        assert_eq!(fx.link.borrow().calls, vec!["radio off"]);
    }

    #[test]
    fn zero_attempts_polls_once() {
        let mut fx = fixture(Some(network()), None, Ok(200), 0);
        let chain = RecordingChain::new();
        let mut leds = LedBank::new(&chain, 1);

        let result = fx.client.submit(&record(), &mut leds);

        assert!(matches!(result, Err(SubmitError::ConnectTimeout { attempts: 1 })));
        assert_eq!(fx.link.borrow().polls, 1);
    }
}
