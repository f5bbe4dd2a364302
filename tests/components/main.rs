//! Component-level tests, one module per file under src/components and src/backends

mod test_image_utils;
mod test_permission;
mod test_recovery;
mod test_service_worker;
mod test_token;
