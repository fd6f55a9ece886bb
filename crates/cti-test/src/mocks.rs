//! A scripted [`Boundary`] that records what crosses it.

use std::sync::{Arc, Mutex};

use cti_sys::{
    Boundary, BoundaryError, BoundaryResult, PackedValue, RawArg, RawHandle, TypeCode,
};

/// One call observed by [`MockBoundary`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    /// Address of the called handle.
    pub handle: usize,
    /// Argument type codes, in order.
    pub type_codes: Vec<TypeCode>,
}

#[derive(Debug, Clone, Copy)]
enum MockResult {
    Int(i64),
    Handle(TypeCode, usize),
}

/// Mock implementation of [`Boundary`].
///
/// Resolves a fixed set of names to fake handles and answers every call
/// with the same scalar result. Nothing is ever dereferenced, so handles
/// can be arbitrary addresses.
#[derive(Debug, Clone)]
pub struct MockBoundary {
    /// Registered names and their fake handle addresses.
    functions: Arc<Mutex<Vec<(String, usize)>>>,
    /// Captured `(tag, name)` lookups.
    lookups: Arc<Mutex<Vec<(String, String)>>>,
    /// Captured calls, failing ones included.
    calls: Arc<Mutex<Vec<RecordedCall>>>,
    /// Answer to every call.
    result: Arc<Mutex<MockResult>>,
    /// Status to fail calls with, if any.
    failure: Arc<Mutex<Option<i32>>>,
}

impl MockBoundary {
    /// A boundary with no names that answers calls with `Int64(0)`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            functions: Arc::new(Mutex::new(Vec::new())),
            lookups: Arc::new(Mutex::new(Vec::new())),
            calls: Arc::new(Mutex::new(Vec::new())),
            result: Arc::new(Mutex::new(MockResult::Int(0))),
            failure: Arc::new(Mutex::new(None)),
        }
    }

    /// Publish `name` with a fake handle address.
    #[must_use]
    pub fn with_function(self, name: &str, addr: usize) -> Self {
        if let Ok(mut guard) = self.functions.lock() {
            guard.push((name.to_owned(), addr));
        }
        self
    }

    /// Answer every call with `Int64(value)`.
    #[must_use]
    pub fn with_int_result(self, value: i64) -> Self {
        if let Ok(mut guard) = self.result.lock() {
            *guard = MockResult::Int(value);
        }
        self
    }

    /// Answer every call with a handle tagged `code`.
    #[must_use]
    pub fn with_result(self, code: TypeCode, addr: usize) -> Self {
        if let Ok(mut guard) = self.result.lock() {
            *guard = MockResult::Handle(code, addr);
        }
        self
    }

    /// Fail every call with `status`.
    #[must_use]
    pub fn failing(self, status: i32) -> Self {
        self.set_failure(Some(status));
        self
    }

    /// Start or stop failing calls.
    pub fn set_failure(&self, status: Option<i32>) {
        if let Ok(mut guard) = self.failure.lock() {
            *guard = status;
        }
    }

    /// Lookups seen so far.
    #[must_use]
    pub fn lookups(&self) -> Vec<(String, String)> {
        self.lookups.lock().map(|g| g.clone()).unwrap_or_default()
    }

    /// Calls seen so far.
    #[must_use]
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().map(|g| g.clone()).unwrap_or_default()
    }
}

impl Default for MockBoundary {
    fn default() -> Self {
        Self::new()
    }
}

impl Boundary for MockBoundary {
    fn list_names(&self, _tag: &str) -> BoundaryResult<Vec<String>> {
        Ok(self
            .functions
            .lock()
            .map(|g| g.iter().map(|(n, _)| n.clone()).collect())
            .unwrap_or_default())
    }

    fn get_handle(&self, tag: &str, name: &str) -> BoundaryResult<RawHandle> {
        if let Ok(mut guard) = self.lookups.lock() {
            guard.push((tag.to_owned(), name.to_owned()));
        }
        self.functions
            .lock()
            .ok()
            .and_then(|g| g.iter().find(|(n, _)| n == name).map(|(_, a)| *a))
            .map(RawHandle::from_addr)
            .ok_or_else(|| BoundaryError::NameNotFound {
                tag: tag.to_owned(),
                name: name.to_owned(),
            })
    }

    unsafe fn call(
        &self,
        handle: RawHandle,
        type_codes: &[TypeCode],
        values: &[PackedValue],
    ) -> BoundaryResult<RawArg> {
        if type_codes.len() != values.len() {
            return Err(BoundaryError::ArityMismatch {
                codes: type_codes.len(),
                values: values.len(),
            });
        }
        if let Ok(mut guard) = self.calls.lock() {
            guard.push(RecordedCall {
                handle: handle.addr(),
                type_codes: type_codes.to_vec(),
            });
        }
        if let Some(status) = self.failure.lock().ok().and_then(|g| *g) {
            return Err(BoundaryError::CallFailed {
                operation: "CTIPackedFuncCall",
                status,
            });
        }
        let result = self
            .result
            .lock()
            .map(|g| *g)
            .unwrap_or(MockResult::Int(0));
        Ok(match result {
            MockResult::Int(v) => RawArg::new(TypeCode::INT64, PackedValue::int64(v)),
            MockResult::Handle(code, addr) => {
                RawArg::new(code, PackedValue::handle(RawHandle::from_addr(addr)))
            },
        })
    }
}
