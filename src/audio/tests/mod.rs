//! Test doubles and fixtures shared by the unit and integration tests
