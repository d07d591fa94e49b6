//! Cryptography used by the registrar. Only password hashing lives here; the
//! module boundary keeps Argon2 details out of the registration flow.

pub mod passwords;
