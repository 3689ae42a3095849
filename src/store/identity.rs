//! Startup policy: which backend to use and who the user is
//!
//! Both decisions are pure functions of the environment at launch and are
//! not revisited until the next launch.

use chrono::NaiveDate;
use serde::Serialize;

use crate::models::{avatar_for, UserProfile, UserStats, DEFAULT_COUNTRY};

pub const DEMO_USER_ID: &str = "demo-user-123";
pub const DEMO_USER_NAME: &str = "Demo User";
pub const DEMO_USER_EMAIL: &str = "demo@example.com";

/// Persistence strategy for the session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendChoice {
    Remote,
    Local,
}

/// Remote only when the backend is configured and a session exists
pub fn choose_backend(backend_configured: bool, has_session: bool) -> BackendChoice {
    if backend_configured && has_session {
        BackendChoice::Remote
    } else {
        BackendChoice::Local
    }
}

/// Where the session's identity came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IdentitySource {
    Session,
    Stored,
    Demo,
}

/// Everything identity bootstrapping looks at
#[derive(Debug, Clone)]
pub struct IdentityEnv {
    /// Profile belonging to an authenticated remote session
    pub session_profile: Option<UserProfile>,
    /// Profile persisted in device storage
    pub stored_profile: Option<UserProfile>,
    pub today: NaiveDate,
}

/// Authenticated session, then stored profile, then a fresh demo identity
pub fn bootstrap_identity(env: IdentityEnv) -> (UserProfile, IdentitySource) {
    if let Some(profile) = env.session_profile {
        return (profile, IdentitySource::Session);
    }
    if let Some(profile) = env.stored_profile {
        return (profile, IdentitySource::Stored);
    }
    (demo_profile(env.today), IdentitySource::Demo)
}

/// Synthetic profile used when nobody has signed in yet
pub fn demo_profile(today: NaiveDate) -> UserProfile {
    UserProfile {
        id: DEMO_USER_ID.to_string(),
        name: DEMO_USER_NAME.to_string(),
        avatar: Some(avatar_for(DEMO_USER_NAME)),
        email: DEMO_USER_EMAIL.to_string(),
        country: DEFAULT_COUNTRY.to_string(),
        joined: Some(today),
        bio: String::new(),
        stats: UserStats::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 19).unwrap()
    }

    fn named(name: &str) -> UserProfile {
        UserProfile {
            name: name.to_string(),
            ..demo_profile(today())
        }
    }

    #[test]
    fn test_backend_choice() {
        assert_eq!(choose_backend(true, true), BackendChoice::Remote);
        assert_eq!(choose_backend(true, false), BackendChoice::Local);
        assert_eq!(choose_backend(false, true), BackendChoice::Local);
        assert_eq!(choose_backend(false, false), BackendChoice::Local);
    }

    #[test]
    fn test_session_wins_over_stored() {
        let (profile, source) = bootstrap_identity(IdentityEnv {
            session_profile: Some(named("remote")),
            stored_profile: Some(named("local")),
            today: today(),
        });
        assert_eq!(source, IdentitySource::Session);
        assert_eq!(profile.name, "remote");
    }

    #[test]
    fn test_stored_used_without_session() {
        let (profile, source) = bootstrap_identity(IdentityEnv {
            session_profile: None,
            stored_profile: Some(named("local")),
            today: today(),
        });
        assert_eq!(source, IdentitySource::Stored);
        assert_eq!(profile.name, "local");
    }

    #[test]
    fn test_demo_identity_as_last_resort() {
        let (profile, source) = bootstrap_identity(IdentityEnv {
            session_profile: None,
            stored_profile: None,
            today: today(),
        });
        assert_eq!(source, IdentitySource::Demo);
        assert_eq!(profile.id, DEMO_USER_ID);
        assert_eq!(profile.email, DEMO_USER_EMAIL);
        assert_eq!(profile.joined, Some(today()));
        assert_eq!(profile.stats, UserStats::default());
    }
}
