//! Mock construction helpers

use mockall::mock;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use treeflow::components::{BackendFuture, CalculationBackend, TemplateDefinition};
use treeflow::Resource;

mock! {
    pub Kernel {}

    impl CalculationBackend for Kernel {
        fn execute(&self, code: String) -> BackendFuture;
    }
}

mock! {
    pub Geometry {}

    impl Resource for Geometry {
        fn kind(&self) -> &str;
        fn release(&self);
    }
}

impl std::fmt::Debug for MockKernel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockKernel").finish()
    }
}

impl std::fmt::Debug for MockGeometry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockGeometry").finish()
    }
}

impl std::fmt::Debug for RecordingKernel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordingKernel")
            .field("executed", &self.executed())
            .finish()
    }
}

/// Backend that accepts everything and remembers the code it was sent
#[derive(Default)]
pub struct RecordingKernel {
    code: Mutex<Vec<String>>,
}

impl RecordingKernel {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn executed(&self) -> Vec<String> {
        self.code.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

impl CalculationBackend for RecordingKernel {
    fn execute(&self, code: String) -> BackendFuture {
        if let Ok(mut log) = self.code.lock() {
            log.push(code);
        }
        Box::pin(async { Ok(()) })
    }
}

/// A geometry mock expecting exactly `releases` release calls
pub fn geometry(releases: usize) -> MockGeometry {
    let mut geometry = MockGeometry::new();
    geometry.expect_kind().return_const("curve".to_string());
    geometry.expect_release().times(releases).return_const(());
    geometry
}

/// Resource that counts its releases in a shared counter
#[derive(Debug)]
pub struct CountedGeometry(pub Arc<AtomicUsize>);

impl Resource for CountedGeometry {
    fn kind(&self) -> &str {
        "counted"
    }

    fn release(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

/// `functionName` with inputs A and B and one output N
pub fn add_template(name: &str) -> TemplateDefinition {
    serde_json::from_value(serde_json::json!({
        "functionName": name,
        "componentPrettyName": "Add Numbers",
        "inputs": [{"shortName": "A", "type": 0}, {"shortName": "B", "type": 0}],
        "outputs": [{"shortName": "N", "type": 0}],
        "template": "<%= RESULT %> = <%= IN_A %> + <%= IN_B %>"
    }))
    .unwrap()
}
