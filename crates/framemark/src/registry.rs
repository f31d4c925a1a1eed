// SPDX-License-Identifier: Apache-2.0
// Copyright © 2025 Au-Zone Technologies. All Rights Reserved.

//! Open annotation sessions keyed by a stable id.
//!
//! A session is created explicitly with [`Registry::open`] and lives until
//! [`Registry::close`] hands it back.

use crate::{Collection, Error, Saver};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Stable identifier of an open session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(Uuid);

impl SessionId {
    fn new() -> Self {
        SessionId(Uuid::new_v4())
    }

    pub fn value(&self) -> Uuid {
        self.0
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<&str> for SessionId {
    type Error = Error;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        Uuid::parse_str(s)
            .map(SessionId)
            .map_err(|e| Error::ArgumentError(format!("Invalid session id '{}': {}", s, e)))
    }
}

/// A collection together with the saver tracking what was persisted.
#[derive(Debug)]
pub struct Session {
    pub collection: Collection,
    pub saver: Saver,
}

#[derive(Debug, Default)]
pub struct Registry {
    sessions: HashMap<SessionId, Session>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a session and returns its id.
    pub fn open(&mut self, collection: Collection, saver: Saver) -> SessionId {
        let id = SessionId::new();
        self.sessions.insert(id, Session { collection, saver });
        debug!("Opened session {}", id);
        id
    }

    pub fn get(&self, id: &SessionId) -> Option<&Session> {
        self.sessions.get(id)
    }

    pub fn get_mut(&mut self, id: &SessionId) -> Option<&mut Session> {
        self.sessions.get_mut(id)
    }

    /// Removes a session and hands it back to the caller.
    pub fn close(&mut self, id: &SessionId) -> Option<Session> {
        let session = self.sessions.remove(id);
        if session.is_some() {
            debug!("Closed session {}", id);
        }
        session
    }

    pub fn ids(&self) -> impl Iterator<Item = &SessionId> {
        self.sessions.keys()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
