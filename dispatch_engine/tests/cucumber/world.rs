use std::{collections::HashMap, fmt::Debug};

use cucumber::World;
use dispatch_engine::{db_types::Order, DispatchError};

use crate::support::harness::Harness;

#[derive(Default, World)]
pub struct DispatchWorld {
    pub system: Option<Harness>,
    pub results: HashMap<String, Result<Order, DispatchError>>,
    pub last_error: Option<DispatchError>,
}

impl Debug for DispatchWorld {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "DispatchWorld({} results)", self.results.len())
    }
}

impl DispatchWorld {
    pub async fn system(&mut self) -> &Harness {
        if self.system.is_none() {
            self.system = Some(Harness::new().await);
        }
        self.system.as_ref().expect("Dispatch system not initialised")
    }

    pub fn sys(&self) -> &Harness {
        self.system.as_ref().expect("Dispatch system not initialised")
    }
}
