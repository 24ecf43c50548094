//! Mock directory for testing and development.
//!
//! [`MockDirectory`] is an in-memory [`DirectoryConnector`] with a list of
//! accounts, scripted failures and call counters. Clones share state, so a
//! test can keep one clone for assertions while the client owns another.
//!
//! # Examples
//!
//! ```
//! use gatehouse_directory::DirectoryError;
//! use gatehouse_directory::mock::MockDirectory;
//!
//! let directory = MockDirectory::new().with_user("23456789", "01", "alice");
//! directory.fail_next_search(DirectoryError::connection("reset by peer"));
//!
//! assert_eq!(directory.searches(), 0);
//! ```

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::{DirectoryError, Result};
use crate::filter::AccountFilter;
use crate::traits::{DirectoryConnection, DirectoryConnector, DirectoryEntry};

/// In-memory directory.
#[derive(Debug, Clone, Default)]
pub struct MockDirectory {
    state: Arc<Mutex<MockState>>,
}

#[derive(Debug, Default)]
struct MockState {
    accounts: Vec<MockAccount>,
    connect_failures: VecDeque<DirectoryError>,
    search_failures: VecDeque<DirectoryError>,
    unbind_failures: VecDeque<DirectoryError>,
    hanging_searches: usize,
    connects: usize,
    searches: usize,
    unbinds: usize,
    filters: Vec<String>,
}

#[derive(Debug, Clone)]
struct MockAccount {
    id: String,
    location_code: String,
    username: Option<String>,
    disabled: bool,
}

impl MockState {
    fn matching(&self, filter: &AccountFilter, attribute: &str) -> Vec<DirectoryEntry> {
        self.accounts
            .iter()
            .filter(|account| {
                !account.disabled
                    && account.id == filter.id()
                    && account.location_code == filter.location_code()
            })
            .map(|account| match &account.username {
                Some(username) => {
                    DirectoryEntry::new(format!("uid={username},ou=people"))
                        .with_attribute(attribute, username.as_str())
                }
                None => DirectoryEntry::new(format!("cn={},ou=people", account.id)),
            })
            .collect()
    }
}

fn lock(state: &Mutex<MockState>) -> MutexGuard<'_, MockState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl MockDirectory {
    /// Create an empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    fn with_account(self, account: MockAccount) -> Self {
        lock(&self.state).accounts.push(account);
        self
    }

    /// Add an enabled account.
    pub fn with_user(
        self,
        id: impl Into<String>,
        location_code: impl Into<String>,
        username: impl Into<String>,
    ) -> Self {
        self.with_account(MockAccount {
            id: id.into(),
            location_code: location_code.into(),
            username: Some(username.into()),
            disabled: false,
        })
    }

    /// Add a disabled account; searches never return it.
    pub fn with_disabled_user(
        self,
        id: impl Into<String>,
        location_code: impl Into<String>,
        username: impl Into<String>,
    ) -> Self {
        self.with_account(MockAccount {
            id: id.into(),
            location_code: location_code.into(),
            username: Some(username.into()),
            disabled: true,
        })
    }

    /// Add an enabled account whose entry lacks the username attribute.
    pub fn with_nameless_user(self, id: impl Into<String>, location_code: impl Into<String>) -> Self {
        self.with_account(MockAccount {
            id: id.into(),
            location_code: location_code.into(),
            username: None,
            disabled: false,
        })
    }

    /// Make the next connect attempt fail with `error`.
    pub fn fail_next_connect(&self, error: DirectoryError) {
        lock(&self.state).connect_failures.push_back(error);
    }

    /// Make the next search fail with `error`. Calls queue up.
    pub fn fail_next_search(&self, error: DirectoryError) {
        lock(&self.state).search_failures.push_back(error);
    }

    /// Make the next unbind fail with `error`.
    pub fn fail_next_unbind(&self, error: DirectoryError) {
        lock(&self.state).unbind_failures.push_back(error);
    }

    /// Make the next search never complete.
    pub fn hang_next_search(&self) {
        lock(&self.state).hanging_searches += 1;
    }

    /// Number of connect attempts, failed ones included.
    pub fn connects(&self) -> usize {
        lock(&self.state).connects
    }

    /// Number of searches, failed ones included.
    pub fn searches(&self) -> usize {
        lock(&self.state).searches
    }

    /// Number of unbinds, failed ones included.
    pub fn unbinds(&self) -> usize {
        lock(&self.state).unbinds
    }

    /// Filters of all searches so far, rendered as LDAP strings.
    pub fn filters(&self) -> Vec<String> {
        lock(&self.state).filters.clone()
    }
}

/// Connection to a [`MockDirectory`].
#[derive(Debug)]
pub struct MockConnection {
    state: Arc<Mutex<MockState>>,
    bound: bool,
}

impl DirectoryConnector for MockDirectory {
    type Connection = MockConnection;

    async fn connect(&self) -> Result<MockConnection> {
        let mut state = lock(&self.state);
        state.connects += 1;

        if let Some(error) = state.connect_failures.pop_front() {
            return Err(error);
        }

        Ok(MockConnection {
            state: Arc::clone(&self.state),
            bound: true,
        })
    }
}

impl DirectoryConnection for MockConnection {
    async fn search(
        &mut self,
        _base: &str,
        filter: &AccountFilter,
        attribute: &str,
    ) -> Result<Vec<DirectoryEntry>> {
        if !self.bound {
            return Err(DirectoryError::NotConnected);
        }

        let outcome = {
            let mut state = lock(&self.state);
            state.searches += 1;
            state.filters.push(filter.to_string());

            if state.hanging_searches > 0 {
                state.hanging_searches -= 1;
                None
            } else if let Some(error) = state.search_failures.pop_front() {
                Some(Err(error))
            } else {
                Some(Ok(state.matching(filter, attribute)))
            }
        };

        match outcome {
            Some(result) => result,
            None => std::future::pending().await,
        }
    }

    async fn unbind(&mut self) -> Result<()> {
        self.bound = false;

        let mut state = lock(&self.state);
        state.unbinds += 1;
        match state.unbind_failures.pop_front() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}
