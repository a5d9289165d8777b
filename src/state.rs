// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Journal Vault

use std::sync::Arc;

use crate::service::JournalService;

#[derive(Clone)]
pub struct AppState {
    service: Arc<JournalService>,
}

impl AppState {
    pub fn new(service: JournalService) -> Self {
        Self {
            service: Arc::new(service),
        }
    }

    pub fn service(&self) -> &JournalService {
        &self.service
    }
}
