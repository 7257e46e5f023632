//! SET handling.
//!
//! Bindings are applied one at a time in request order. There is no rollback:
//! a failed binding does not undo bindings already written, and later
//! bindings are still attempted. The first failure decides the packet status.

use crate::error::ErrorStatus;
use crate::handler::{RequestContext, ResponseBuilder};
use crate::pdu::Pdu;
use crate::value::Value;
use crate::varbind::VarBind;

use super::Scope;

impl Scope {
    pub(super) fn set(&self, ctx: &RequestContext, pdu: &Pdu) -> Pdu {
        let mut resp = ResponseBuilder::with_capacity(pdu.varbinds.len());

        for (index, vb) in pdu.varbinds.iter().enumerate() {
            let Some(control) = self.registry().get(&vb.oid) else {
                resp.fail(
                    ErrorStatus::NoSuchName,
                    index,
                    VarBind::new(vb.oid.clone(), Value::NoSuchInstance),
                );
                continue;
            };

            if !self.permitted(&mut resp, ctx, index, control) {
                continue;
            }

            if !control.is_writable() {
                resp.fail(ErrorStatus::ReadOnly, index, VarBind::null(vb.oid.clone()));
                continue;
            }

            if vb.value.value_type() != Some(control.value_type()) {
                tracing::debug!(
                    snmp.oid = %vb.oid,
                    snmp.declared = %control.value_type(),
                    snmp.value = ?vb.value,
                    "SET value has the wrong type"
                );
                resp.fail(ErrorStatus::WrongType, index, VarBind::null(vb.oid.clone()));
                continue;
            }

            match control.write(&vb.value) {
                Some(Ok(())) => resp.push(vb.clone()),
                Some(Err(err)) => self.substitute(&mut resp, &err, index, &vb.oid),
                None => resp.fail(ErrorStatus::ReadOnly, index, VarBind::null(vb.oid.clone())),
            }
        }

        resp.into_response(pdu)
    }
}
