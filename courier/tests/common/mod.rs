//! Shared setup for the service integration tests.

#![allow(dead_code)]

use courier::{CourierConfig, MessagingService, User};

pub async fn memory_service() -> MessagingService {
    MessagingService::connect(&CourierConfig::for_url("sqlite::memory:"))
        .await
        .expect("Failed to open in-memory service")
}

pub async fn users(service: &MessagingService, names: &[&str]) -> Vec<User> {
    let mut created = Vec::new();
    for name in names {
        created.push(
            service
                .create_user(name)
                .await
                .expect("Failed to create user"),
        );
    }
    created
}
