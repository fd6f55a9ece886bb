//! The call protocol: encode, cross the boundary once, decode.

use cti_core::{CtiResult, Decoder, Encoder, FuncRef, Value};
use tracing::{debug, debug_span, warn};

use crate::library::Context;

/// Invoke `func` with `args`.
///
/// Every argument is encoded before the boundary is touched, so an encode
/// failure never reaches the foreign side. A decode failure after the call
/// returns cannot undo whatever the callee already did.
pub(crate) fn invoke(ctx: &Context, func: FuncRef, name: &str, args: &[Value]) -> CtiResult<Value> {
    let span = debug_span!("packed_call", function = name, args = args.len());
    let _enter = span.enter();

    let packed = Encoder::new(&ctx.registry)
        .with_max_depth(ctx.max_depth)
        .pack(args)?;

    // SAFETY: `packed` owns every pointer in its payloads and outlives the
    // call. Function handles only come from the foreign runtime (see
    // `Lib::get` and `Lib::bind`).
    let ret = unsafe {
        ctx.boundary
            .call(func.handle(), packed.type_codes(), packed.values())
    }?;

    // SAFETY: return memory is valid until the next boundary call on this
    // thread, and the decoder copies everything out before returning.
    let decoded = unsafe {
        Decoder::new(&ctx.registry)
            .with_max_depth(ctx.max_depth)
            .decode(ret)
    };
    match decoded {
        Ok(value) => {
            debug!(ret = %value.type_code(), "packed call returned");
            Ok(value)
        },
        Err(e) => {
            warn!(
                error = %e,
                "failed to decode return value; side effects of the completed call are not undone"
            );
            Err(e)
        },
    }
}
