#![allow(non_snake_case)]

use std::sync::Arc;

use super::*;

struct Conn {
    port: u16,
}

impl Wrappable for Conn {
    fn wrapper_name() -> String {
        "Connection".to_string()
    }
}

struct Other;

impl Wrappable for Other {}

fn test_sync() -> Synchronizer {
    Synchronizer::named("registry-tests")
}

#[test]
fn Registry___register___uses_the_wrappable_name() {
    let sync = test_sync();

    let entry = sync.registry().register::<Conn>();

    assert_eq!(entry.wrapper_name, "Connection");
    assert!(entry.impl_name.ends_with("Conn"));
}

#[test]
fn Registry___register___is_idempotent() {
    let sync = test_sync();

    let first = sync.registry().register::<Conn>();
    let second = sync.registry().register::<Conn>();

    assert_eq!(first.wrapper_name, second.wrapper_name);
    assert_eq!(sync.registry().registered_types(), 1);
}

#[test]
fn Registry___register_named___first_registration_wins() {
    let sync = test_sync();

    sync.registry()
        .register_named::<Conn>("Primary", Some("db".to_string()));
    let second = sync
        .registry()
        .register_named::<Conn>("Secondary", None);

    assert_eq!(second.wrapper_name, "Primary");
    assert_eq!(second.qualified_name(), "db::Primary");
}

#[test]
fn Registry___is_registered___only_after_first_wrap() {
    let sync = test_sync();

    assert!(!sync.registry().is_registered::<Other>());
    let _handle = sync.wrap_instance(Arc::new(Other));
    assert!(sync.registry().is_registered::<Other>());
}

#[test]
fn Registry___wrap_instance___reuses_the_live_wrapper() {
    let sync = test_sync();
    let conn = Arc::new(Conn { port: 5432 });

    let first = sync.wrap_instance(conn.clone());
    let second = sync.wrap_instance(conn.clone());

    assert!(first.ptr_eq(&second));
    assert_eq!(sync.registry().live_instances(), 1);
}

#[test]
fn Registry___wrap_instance___distinct_instances_get_distinct_wrappers() {
    let sync = test_sync();

    let first = sync.wrap_instance(Arc::new(Conn { port: 1 }));
    let second = sync.wrap_instance(Arc::new(Conn { port: 2 }));

    assert!(!first.ptr_eq(&second));
    assert_eq!(first.get(|c| c.port), 1);
    assert_eq!(second.get(|c| c.port), 2);
}

#[test]
fn Registry___dropped_wrapper___entry_is_collected() {
    let sync = test_sync();
    let conn = Arc::new(Conn { port: 9 });

    let handle = sync.wrap_instance(conn.clone());
    assert_eq!(sync.registry().live_instances(), 1);

    drop(handle);
    sync.registry().compact();
    assert_eq!(sync.registry().live_instances(), 0);

    // the implementation outlived its wrapper; a fresh one may be issued
    let fresh = sync.wrap_instance(conn.clone());
    assert!(Arc::ptr_eq(&fresh.implementation(), &conn));
}

#[test]
fn Registry___type_entry___reports_registration() {
    let sync = test_sync();

    assert!(sync.registry().type_entry::<Conn>().is_none());
    sync.registry().register::<Conn>();

    let entry = sync.registry().type_entry::<Conn>().unwrap();
    assert_eq!(entry.qualified_name(), "Connection");
}

#[test]
fn short_type_name___strips_the_module_path() {
    assert_eq!(short_type_name::<Conn>(), "Conn");
    assert_eq!(short_type_name::<Vec<u8>>(), "Vec<u8>");
}
