//! Fixed test IDs and credentials for deterministic tests
//!
//! Using fixed UUIDs prevents flaky tests caused by random data.

use uuid::Uuid;

// User IDs (100-199)
pub const TEST_USER_ALICE: Uuid = Uuid::from_u128(100);
pub const TEST_USER_BOB: Uuid = Uuid::from_u128(101);

// Content IDs that are never created
pub const MISSING_COURSE_ID: Uuid = Uuid::from_u128(9000);
pub const MISSING_SECTION_ID: Uuid = Uuid::from_u128(9001);
pub const MISSING_LESSON_ID: Uuid = Uuid::from_u128(9002);

// Emails
pub const TEST_EMAIL_ALICE: &str = "alice@example.com";
pub const TEST_EMAIL_BOB: &str = "bob@example.com";
pub const TEST_EMAIL_ADMIN: &str = "admin@example.com";

// Passwords (meet the minimum length)
pub const TEST_PASSWORD: &str = "correct-horse-battery";
pub const TEST_WRONG_PASSWORD: &str = "incorrect-horse-battery";
