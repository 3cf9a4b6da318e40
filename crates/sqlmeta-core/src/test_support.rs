use crate::{
    Settings, collection::Populator, key::ObjectKey, kind::ObjectKind, object::SqlObject,
};
use std::{rc::Rc, sync::Once};

/// Route `tracing` output through the test harness; set `RUST_LOG` to see it.
pub(crate) fn init_tracing() {
    static INIT: Once = Once::new();

    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// Existing server root with default settings.
pub(crate) fn server(name: &str, source: Option<Rc<dyn Populator>>) -> SqlObject {
    server_with(name, source, Settings::default())
}

pub(crate) fn server_with(
    name: &str,
    source: Option<Rc<dyn Populator>>,
    settings: Settings,
) -> SqlObject {
    init_tracing();

    SqlObject::root(
        ObjectKind::Server,
        ObjectKey::named(name),
        source,
        Rc::new(settings),
    )
}
