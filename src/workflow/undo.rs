use chrono::{DateTime, Duration, Utc};

use crate::error::ServiceError;
use crate::io::undo_log::UndoToken;

/// Result of one scheduled tick
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UndoTick {
    Tick { token_id: String, remaining_secs: i64 },
    Expired { token_id: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UndoSession {
    token: UndoToken,
    remaining: Duration,
    next_tick_at: DateTime<Utc>,
}

impl UndoSession {
    pub fn start(token: UndoToken, now: DateTime<Utc>) -> Self {
        let remaining = token.remaining(now);
        UndoSession {
            token,
            remaining,
            next_tick_at: now + Duration::seconds(1),
        }
    }

    pub fn token(&self) -> &UndoToken {
        &self.token
    }

    pub fn remaining(&self) -> Duration {
        self.remaining
    }

    /// Whole seconds left, rounded up so the countdown never shows 0 while live
    pub fn remaining_secs(&self) -> i64 {
        let ms = self.remaining.num_milliseconds();
        (ms + 999) / 1000
    }

    fn is_due(&self, now: DateTime<Utc>) -> bool {
        now >= self.next_tick_at
    }

    fn tick(&mut self, now: DateTime<Utc>) -> UndoTick {
        self.remaining = self.token.remaining(now);
        if self.remaining <= Duration::zero() {
            return UndoTick::Expired {
                token_id: self.token.id.clone(),
            };
        }
        self.next_tick_at = now + Duration::seconds(1);
        UndoTick::Tick {
            token_id: self.token.id.clone(),
            remaining_secs: self.remaining_secs(),
        }
    }
}

/// Holder for at most one live undo session
#[derive(Debug, Default)]
pub struct UndoSlot {
    session: Option<UndoSession>,
}

impl UndoSlot {
    /// Start a countdown for `token`, replacing any earlier session.
    pub fn open(&mut self, token: UndoToken, now: DateTime<Utc>) {
        if let Some(old) = &self.session {
            tracing::debug!(token = %old.token.id, "undo session superseded");
        }
        self.session = Some(UndoSession::start(token, now));
    }

    pub fn session(&self) -> Option<&UndoSession> {
        self.session.as_ref()
    }

    pub fn is_active(&self) -> bool {
        self.session.is_some()
    }

    /// Run the tick if one is due. An expiry tears the session down.
    pub fn poll(&mut self, now: DateTime<Utc>) -> Option<UndoTick> {
        let session = self.session.as_mut()?;
        if !session.is_due(now) {
            return None;
        }
        let tick = session.tick(now);
        if let UndoTick::Expired { token_id } = &tick {
            tracing::info!(token = %token_id, "undo window expired");
            self.session = None;
        }
        Some(tick)
    }

    /// Take the token for reversal. The session ends whether or not the
    /// token is still live.
    pub fn redeem(&mut self, now: DateTime<Utc>) -> Result<UndoToken, ServiceError> {
        let session = self.session.take().ok_or(ServiceError::UndoUnavailable)?;
        if session.token.is_expired(now) {
            tracing::info!(token = %session.token.id, "undo requested after expiry");
            return Err(ServiceError::UndoUnavailable);
        }
        Ok(session.token)
    }

    pub fn dismiss(&mut self) -> bool {
        self.session.take().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t0() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    fn secs(n: i64) -> Duration {
        Duration::seconds(n)
    }

    #[test]
    fn ticks_once_per_second_then_expires() {
        let mut slot = UndoSlot::default();
        slot.open(UndoToken::issue("Deleted 1 task", t0(), 3), t0());

        assert_eq!(slot.poll(t0() + Duration::milliseconds(500)), None);
        assert!(matches!(
            slot.poll(t0() + secs(1)),
            Some(UndoTick::Tick { remaining_secs: 2, .. })
        ));
        assert_eq!(slot.poll(t0() + Duration::milliseconds(1500)), None);
        assert!(matches!(
            slot.poll(t0() + secs(2)),
            Some(UndoTick::Tick { remaining_secs: 1, .. })
        ));
        assert!(matches!(slot.poll(t0() + secs(3)), Some(UndoTick::Expired { .. })));
        assert!(!slot.is_active());
        assert_eq!(slot.poll(t0() + secs(4)), None);
    }

    #[test]
    fn redeem_after_two_seconds_is_unavailable() {
        let mut slot = UndoSlot::default();
        slot.open(UndoToken::issue("Deleted 2 tasks", t0(), 2), t0());
        let err = slot.redeem(t0() + secs(2)).unwrap_err();
        assert!(matches!(err, ServiceError::UndoUnavailable));
        assert_eq!(err.to_string(), "undo unavailable");
        assert!(!slot.is_active());
    }

    #[test]
    fn redeem_live_token_ends_session() {
        let mut slot = UndoSlot::default();
        let token = UndoToken::issue("Deleted 1 task", t0(), 30);
        slot.open(token.clone(), t0());
        assert_eq!(slot.redeem(t0() + secs(5)).unwrap(), token);
        assert!(matches!(slot.redeem(t0() + secs(6)), Err(ServiceError::UndoUnavailable)));
    }

    #[test]
    fn dismiss_stops_ticks() {
        let mut slot = UndoSlot::default();
        slot.open(UndoToken::issue("x", t0(), 30), t0());
        assert!(slot.dismiss());
        assert_eq!(slot.poll(t0() + secs(1)), None);
        assert!(!slot.dismiss());
    }

    #[test]
    fn remaining_rounds_up() {
        let session = UndoSession::start(UndoToken::issue("x", t0(), 30), t0() + Duration::milliseconds(200));
        assert_eq!(session.remaining_secs(), 30);
    }
}
