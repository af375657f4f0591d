//! Shared harness: a meter actor wired to a `MockDevice` on virtual time.

#![allow(dead_code)]

use orion_meter::adapters::{MockAdapter, MockDevice};
use orion_meter::{ConnectionState, MeterEvent, MeterHandle, MeterPayload, Settings};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

pub const ORP: &str = "119,B15164,2.39,8,10/18/26 09:40:00,2,ORP,1,220.0";
pub const PH_CAL: &str =
    "119,B15164,2.39,8,10/18/26 09:15:40,5,PH,1,7.00,pH,-3.1,mV,25.1,C,AUTO,98.7,%,-3.1,mV";
pub const COND_CAL: &str =
    "119,B15164,2.39,8,10/18/26 09:30:02,3,COND,1,1413,uS/cm,2.98,mS,25.0,C,AUTO,0.475,/cm,0.0,uS";
pub const MEASUREMENT: &str = "119,B15164,2.39,8,10/19/26 14:02:11,7.01,pH,-2.3,mV,24.8,C,98.6,%,5,1413,uS/cm,1.41,mS,0,0,2.1,25.0,C,0.475,/cm,3";

pub const FLASH: &str = "KEY WWWWWWWWWWWW";

/// Upper bound on any wait, in virtual time.
pub const PATIENCE: Duration = Duration::from_secs(300);

pub struct Bench {
    pub meter: MeterHandle,
    pub task: JoinHandle<()>,
    pub events: broadcast::Receiver<MeterEvent>,
    pub device: MockDevice,
}

pub fn config_dump() -> String {
    vec!["1"; 62].join(",")
}

/// Spawn a meter on a mock link and open it.
pub async fn start() -> Bench {
    start_with(Settings::default()).await
}

pub async fn start_with(settings: Settings) -> Bench {
    let (adapter, mut devices) = MockAdapter::new();
    let (meter, task) = MeterHandle::spawn(&settings, adapter);
    let events = meter.subscribe();
    meter.open().await.unwrap();
    let device = devices.recv().await.unwrap();
    Bench {
        meter,
        task,
        events,
        device,
    }
}

impl Bench {
    pub async fn next_command(&mut self) -> String {
        tokio::time::timeout(PATIENCE, self.device.next_command())
            .await
            .expect("no command from driver")
            .unwrap()
    }

    /// Read commands until `text` arrives; returns the commands skipped.
    pub async fn skip_until(&mut self, text: &str) -> Vec<String> {
        let mut skipped = Vec::new();
        loop {
            let command = self.next_command().await;
            if command == text {
                return skipped;
            }
            skipped.push(command);
        }
    }

    /// Play a healthy meter through the heartbeat and initialization
    /// sequence until the driver is online.
    pub async fn bring_online(&mut self) {
        let mut method_answered = false;
        loop {
            let command = self.next_command().await;
            match command.as_str() {
                "GETCAL ORP" => self.device.send_line(ORP).await.unwrap(),
                "GETCAL PH" => self.device.send_line(PH_CAL).await.unwrap(),
                "GETCAL COND" => self.device.send_line(COND_CAL).await.unwrap(),
                "GETMENU 0000,6,62" => self.device.send_line(&config_dump()).await.unwrap(),
                // the first GETMEAS of the sequence asks for the method
                "GETMEAS" if !method_answered => {
                    self.device.send_line("Method7").await.unwrap();
                    method_answered = true;
                }
                "GETMEAS" => {
                    self.device.send_line(MEASUREMENT).await.unwrap();
                    break;
                }
                _ => {}
            }
        }
        self.wait_for_state(ConnectionState::Online).await;
    }

    /// Receive events until one matches.
    pub async fn wait_for<F>(&mut self, mut matches: F) -> MeterPayload
    where
        F: FnMut(&MeterPayload) -> bool,
    {
        tokio::time::timeout(PATIENCE, async {
            loop {
                let event = self.events.recv().await.unwrap();
                if matches(&event.payload) {
                    return event.payload;
                }
            }
        })
        .await
        .expect("expected event never arrived")
    }

    pub async fn wait_for_state(&mut self, state: ConnectionState) {
        self.wait_for(|p| *p == MeterPayload::State(state)).await;
    }

    /// Events already published, without waiting.
    pub fn drain(&mut self) -> Vec<MeterPayload> {
        let mut out = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            out.push(event.payload);
        }
        out
    }
}

pub fn states(payloads: &[MeterPayload]) -> Vec<ConnectionState> {
    payloads
        .iter()
        .filter_map(|p| match p {
            MeterPayload::State(s) => Some(*s),
            _ => None,
        })
        .collect()
}
