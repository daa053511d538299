//! Invariant checks excluded from coverage reports.

#![cfg_attr(coverage_nightly, coverage(off))]

use stitchql_core::OpId;

use crate::registry::{Operation, Registry};
use crate::stitch::{CallId, ObjectRecorder, OpCall, RecorderId, StitchedGraph};

impl Registry {
    pub(crate) fn ensure_op(&self, op: OpId) -> &Operation {
        self.ops_slice().get(op.as_u32() as usize).unwrap_or_else(|| {
            panic!(
                "Registry: operation #{} not found among {} operations \
                 (graphs must be built against the same registry)",
                op.as_u32(),
                self.len()
            )
        })
    }
}

impl StitchedGraph {
    pub(crate) fn ensure_recorder(&self, id: RecorderId) -> &ObjectRecorder {
        self.recorders_slice()
            .get(id.index())
            .unwrap_or_else(|| panic!("StitchedGraph: recorder {id:?} not found"))
    }

    pub(crate) fn ensure_call(&self, id: CallId) -> &OpCall {
        self.calls_slice()
            .get(id.index())
            .unwrap_or_else(|| panic!("StitchedGraph: call {id:?} not found"))
    }
}
