//! Liveness beacon scheduling
//!
//! Polled once per tick. A heartbeat goes out as soon as a session starts
//! and then whenever the previous one is older than the interval; a screen
//! line goes out whenever the top screen differs from the last one
//! announced on this connection.

use std::time::Duration;

use itg_remote_protocol::Beacon;
use tokio::time::Instant;

use crate::session::Session;

#[derive(Debug, Clone)]
pub struct BeaconSchedule {
    heartbeat_interval: Duration,
}

impl BeaconSchedule {
    pub fn new(heartbeat_interval: Duration) -> Self {
        Self { heartbeat_interval }
    }

    /// Returns the beacons due at `now`, updating the session's bookkeeping
    pub fn poll(
        &self,
        session: &mut Session,
        screen: &str,
        uptime: Duration,
        now: Instant,
    ) -> Vec<Beacon> {
        let mut due = Vec::new();
        if !session.is_connected() {
            return due;
        }

        let heartbeat_due = session
            .last_heartbeat
            .map_or(true, |last| now.duration_since(last) >= self.heartbeat_interval);
        if heartbeat_due {
            session.last_heartbeat = Some(now);
            due.push(Beacon::heartbeat(
                session.id(),
                uptime.as_millis() as u64,
                screen,
            ));
        }

        if session.last_screen.as_deref() != Some(screen) {
            session.last_screen = Some(screen.to_string());
            due.push(Beacon::screen(screen));
        }

        due
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(beacons: &[Beacon]) -> Vec<&'static str> {
        beacons
            .iter()
            .map(|b| match b {
                Beacon::Heartbeat { .. } => "heartbeat",
                Beacon::Screen { .. } => "screen",
            })
            .collect()
    }

    #[test]
    fn test_nothing_while_disconnected() {
        let schedule = BeaconSchedule::new(Duration::from_secs(2));
        let mut session = Session::new();
        let beacons = schedule.poll(&mut session, "ScreenTitleMenu", Duration::ZERO, Instant::now());
        assert!(beacons.is_empty());
    }

    #[test]
    fn test_heartbeat_and_screen_on_connect() {
        let schedule = BeaconSchedule::new(Duration::from_secs(2));
        let mut session = Session::new();
        session.connect();

        let now = Instant::now();
        let beacons = schedule.poll(&mut session, "ScreenTitleMenu", Duration::ZERO, now);
        assert_eq!(kinds(&beacons), vec!["heartbeat", "screen"]);

        let beacons = schedule.poll(&mut session, "ScreenTitleMenu", Duration::ZERO, now);
        assert!(beacons.is_empty());
    }

    #[test]
    fn test_heartbeat_interval() {
        let schedule = BeaconSchedule::new(Duration::from_secs(2));
        let mut session = Session::new();
        session.connect();

        let start = Instant::now();
        schedule.poll(&mut session, "S", Duration::ZERO, start);

        let early = schedule.poll(&mut session, "S", Duration::ZERO, start + Duration::from_millis(1999));
        assert!(early.is_empty());

        let due = schedule.poll(&mut session, "S", Duration::ZERO, start + Duration::from_secs(2));
        assert_eq!(kinds(&due), vec!["heartbeat"]);
    }

    #[test]
    fn test_screen_change_announced_once() {
        let schedule = BeaconSchedule::new(Duration::from_secs(60));
        let mut session = Session::new();
        session.connect();

        let now = Instant::now();
        schedule.poll(&mut session, "ScreenSelectMusic", Duration::ZERO, now);

        let beacons = schedule.poll(&mut session, "ScreenGameplay", Duration::ZERO, now);
        assert_eq!(beacons, vec![Beacon::screen("ScreenGameplay")]);
        assert!(schedule.poll(&mut session, "ScreenGameplay", Duration::ZERO, now).is_empty());
    }

    #[test]
    fn test_reconnect_reannounces_screen() {
        let schedule = BeaconSchedule::new(Duration::from_secs(60));
        let mut session = Session::new();
        session.connect();

        let now = Instant::now();
        schedule.poll(&mut session, "ScreenGameplay", Duration::ZERO, now);

        session.disconnect();
        session.connect();
        let beacons = schedule.poll(&mut session, "ScreenGameplay", Duration::ZERO, now);
        assert_eq!(kinds(&beacons), vec!["heartbeat", "screen"]);
    }
}
