//! Scopes: one registry served under a set of communities or context names.

use std::collections::HashSet;

use bytes::Bytes;

use crate::error::{Error, ErrorStatus, Result};
use crate::handler::{
    CallbackError, Permission, Registry, RequestContext, ResponseBuilder, VariableControl,
};
use crate::oid::Oid;
use crate::pdu::{Pdu, PduType};
use crate::value::Value;
use crate::varbind::VarBind;

/// A set of variables and the routing keys that select them.
///
/// For v1/v2c the routing keys are communities, for v3 context names. A scope
/// with no routing keys is the default scope and serves every request that no
/// other scope claims.
#[derive(Debug, Clone)]
pub struct Scope {
    routing_keys: Vec<Bytes>,
    registry: Registry,
    escalate_errors: bool,
}

impl Scope {
    pub fn builder() -> ScopeBuilder {
        ScopeBuilder::default()
    }

    pub fn routing_keys(&self) -> &[Bytes] {
        &self.routing_keys
    }

    /// Whether this scope serves requests no other scope claims.
    pub fn is_default(&self) -> bool {
        self.routing_keys.is_empty()
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Serve one PDU.
    ///
    /// Returns `Ok(None)` for traps, which are never acknowledged.
    pub fn serve(&self, ctx: &RequestContext, pdu: &Pdu) -> Result<Option<Pdu>> {
        tracing::trace!(
            snmp.pdu_type = %pdu.pdu_type,
            snmp.request_id = pdu.request_id,
            snmp.varbind_count = pdu.varbinds.len(),
            "serving request"
        );
        match pdu.pdu_type {
            PduType::GetRequest => Ok(Some(self.get(ctx, pdu))),
            PduType::GetNextRequest => Ok(Some(self.get_next(ctx, pdu))),
            PduType::GetBulkRequest => Ok(Some(self.get_bulk(ctx, pdu))),
            PduType::SetRequest => Ok(Some(self.set(ctx, pdu))),
            PduType::TrapV1 | PduType::TrapV2 | PduType::InformRequest => {
                Ok(self.notify(ctx, pdu))
            }
            PduType::Response | PduType::Report => Err(Error::UnsupportedOperation {
                pdu_type: pdu.pdu_type,
            }),
        }
    }

    fn get(&self, ctx: &RequestContext, pdu: &Pdu) -> Pdu {
        let mut resp = ResponseBuilder::with_capacity(pdu.varbinds.len());
        for (index, vb) in pdu.varbinds.iter().enumerate() {
            match self.registry.get(&vb.oid) {
                Some(control) => self.read_into(&mut resp, ctx, index, control),
                None => resp.fail(
                    ErrorStatus::NoSuchName,
                    index,
                    VarBind::new(vb.oid.clone(), Value::NoSuchInstance),
                ),
            }
        }
        resp.into_response(pdu)
    }

    fn get_next(&self, ctx: &RequestContext, pdu: &Pdu) -> Pdu {
        let mut resp = ResponseBuilder::with_capacity(pdu.varbinds.len());
        for (index, vb) in pdu.varbinds.iter().enumerate() {
            self.next_into(&mut resp, ctx, index, &vb.oid);
        }
        resp.into_response(pdu)
    }

    /// GETBULK: non-repeaters step once, then repetitions run over the
    /// repeaters, each repeater continuing from where it stopped.
    fn get_bulk(&self, ctx: &RequestContext, pdu: &Pdu) -> Pdu {
        let non_repeaters = pdu.non_repeaters().min(pdu.varbinds.len());
        let max_repetitions = pdu.max_repetitions();
        let (singles, repeaters) = pdu.varbinds.split_at(non_repeaters);

        let mut resp = ResponseBuilder::with_capacity(
            singles.len() + repeaters.len() * max_repetitions.min(self.registry.len() + 1),
        );
        let mut exhausted: HashSet<&Oid> = HashSet::new();
        for (index, vb) in singles.iter().enumerate() {
            if !self.next_into(&mut resp, ctx, index, &vb.oid) {
                exhausted.insert(&vb.oid);
            }
        }

        let walks: Vec<Vec<usize>> = repeaters
            .iter()
            .map(|vb| self.registry.bulk_next(&vb.oid, max_repetitions))
            .collect();

        for rep in 0..max_repetitions {
            if walks.iter().all(|walk| walk.len() < rep) {
                break;
            }
            for (offset, (vb, walk)) in repeaters.iter().zip(&walks).enumerate() {
                let index = non_repeaters + offset;
                match walk.get(rep).and_then(|&idx| self.registry.entry(idx)) {
                    Some(control) => self.read_into(&mut resp, ctx, index, control),
                    None => {
                        if exhausted.insert(&vb.oid) {
                            resp.push(VarBind::new(vb.oid.clone(), Value::EndOfMibView));
                        }
                    }
                }
            }
        }
        resp.into_response(pdu)
    }

    /// Serve the successor of `oid`. Returns `false` at the end of the MIB view.
    fn next_into(
        &self,
        resp: &mut ResponseBuilder,
        ctx: &RequestContext,
        index: usize,
        oid: &Oid,
    ) -> bool {
        match self.registry.next(oid).and_then(|idx| self.registry.entry(idx)) {
            Some(control) => {
                self.read_into(resp, ctx, index, control);
                true
            }
            None => {
                resp.push(VarBind::new(oid.clone(), Value::EndOfMibView));
                false
            }
        }
    }

    /// Permission check then read, with error substitution.
    fn read_into(
        &self,
        resp: &mut ResponseBuilder,
        ctx: &RequestContext,
        index: usize,
        control: &VariableControl,
    ) {
        let oid = control.oid();
        if !self.permitted(resp, ctx, index, control) {
            return;
        }
        match control.read() {
            None => resp.fail(
                ErrorStatus::ResourceUnavailable,
                index,
                VarBind::null(oid.clone()),
            ),
            Some(Ok(value)) => resp.push(VarBind::new(oid.clone(), value)),
            Some(Err(err)) => self.substitute(resp, &err, index, oid),
        }
    }

    /// Run the permission check. On denial or failure the binding has been
    /// filled in and `false` is returned.
    pub(super) fn permitted(
        &self,
        resp: &mut ResponseBuilder,
        ctx: &RequestContext,
        index: usize,
        control: &VariableControl,
    ) -> bool {
        match control.permit(ctx) {
            Ok(Permission::Allowed) => true,
            Ok(Permission::Denied) => {
                tracing::trace!(
                    snmp.oid = %control.oid(),
                    snmp.scope = %ctx.scope_lossy(),
                    "permission denied"
                );
                resp.fail(
                    ErrorStatus::NoAccess,
                    index,
                    VarBind::null(control.oid().clone()),
                );
                false
            }
            Err(err) => {
                self.substitute(resp, &err, index, control.oid());
                false
            }
        }
    }

    pub(super) fn substitute(
        &self,
        resp: &mut ResponseBuilder,
        err: &CallbackError,
        index: usize,
        oid: &Oid,
    ) {
        tracing::warn!(snmp.oid = %oid, snmp.error = %err, "variable callback failed");
        resp.substitute(err, index, oid, self.escalate_errors);
    }
}

/// Builder for [`Scope`].
///
/// ```
/// use async_snmp_agent::agent::Scope;
/// use async_snmp_agent::handler::VariableControl;
/// use async_snmp_agent::{Value, ValueType, oid};
///
/// let scope = Scope::builder()
///     .routing_key("public")
///     .variable(
///         VariableControl::builder(oid!(1, 3, 6, 1, 2, 1, 1, 5, 0), ValueType::OctetString)
///             .constant(Value::OctetString("edge-router".into()))
///             .build(),
///     )
///     .build()
///     .unwrap();
/// assert!(!scope.is_default());
/// ```
#[derive(Debug, Default)]
#[must_use]
pub struct ScopeBuilder {
    routing_keys: Vec<Bytes>,
    variables: Vec<VariableControl>,
    escalate_errors: bool,
}

impl ScopeBuilder {
    /// Serve requests for this community (v1/v2c) or context name (v3).
    pub fn routing_key(mut self, key: impl Into<Bytes>) -> Self {
        self.routing_keys.push(key.into());
        self
    }

    pub fn variable(mut self, variable: VariableControl) -> Self {
        self.variables.push(variable);
        self
    }

    pub fn variables(mut self, variables: impl IntoIterator<Item = VariableControl>) -> Self {
        self.variables.extend(variables);
        self
    }

    /// Report callback failures as `genErr` instead of only substituting an
    /// `ERROR: ...` string. Off by default.
    pub fn escalate_errors(mut self, escalate: bool) -> Self {
        self.escalate_errors = escalate;
        self
    }

    /// Sort the registry. Fails if an OID is registered twice.
    pub fn build(self) -> Result<Scope> {
        Ok(Scope {
            routing_keys: self.routing_keys,
            registry: Registry::new(self.variables)?,
            escalate_errors: self.escalate_errors,
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::message::SecurityLevel;
    use crate::oid;
    use crate::value::ValueType;
    use crate::version::Version;

    pub(crate) fn ctx(pdu_type: PduType) -> RequestContext {
        RequestContext {
            source: "127.0.0.1:40000".parse().unwrap(),
            version: Version::V2c,
            pdu_type,
            request_id: 1,
            scope: Bytes::from_static(b"public"),
            user_name: Bytes::new(),
            security_level: SecurityLevel::NoAuthNoPriv,
        }
    }

    fn int(oid: Oid, v: i32) -> VariableControl {
        VariableControl::builder(oid, ValueType::Integer)
            .constant(Value::Integer(v))
            .build()
    }

    fn serve(scope: &Scope, pdu: Pdu) -> Pdu {
        scope.serve(&ctx(pdu.pdu_type), &pdu).unwrap().unwrap()
    }

    fn get(oids: &[Oid]) -> Pdu {
        Pdu::new(
            PduType::GetRequest,
            1,
            oids.iter().cloned().map(VarBind::null).collect(),
        )
    }

    #[test]
    fn test_get_unknown_is_no_such_name() {
        let scope = Scope::builder().variable(int(oid!(1, 1), 5)).build().unwrap();
        let resp = serve(&scope, get(&[oid!(1, 1), oid!(1, 2)]));
        assert_eq!(resp.status(), ErrorStatus::NoSuchName);
        assert_eq!(resp.error_index, 2);
        assert_eq!(resp.varbinds[0].value, Value::Integer(5));
        assert_eq!(resp.varbinds[1].value, Value::NoSuchInstance);
    }

    #[test]
    fn test_permission_denied_first_error_wins() {
        let denied = VariableControl::builder(oid!(1, 1), ValueType::Integer)
            .constant(Value::Integer(1))
            .on_permission(|_| Permission::Denied)
            .build();
        let scope = Scope::builder()
            .variables([denied, int(oid!(1, 2), 2)])
            .build()
            .unwrap();
        let resp = serve(&scope, get(&[oid!(1, 1), oid!(1, 2), oid!(1, 9)]));
        assert_eq!(resp.status(), ErrorStatus::NoAccess);
        assert_eq!(resp.error_index, 1);
        assert_eq!(resp.varbinds[0].value, Value::Null);
        assert_eq!(resp.varbinds[1].value, Value::Integer(2));
        assert_eq!(resp.varbinds[2].value, Value::NoSuchInstance);
    }

    #[test]
    fn test_panicking_permission_check_substitutes_error_string() {
        let guarded = VariableControl::builder(oid!(1, 1), ValueType::Integer)
            .constant(Value::Integer(1))
            .on_permission(|_| panic!("policy store down"))
            .build();
        let lenient = Scope::builder()
            .variables([guarded.clone(), int(oid!(1, 2), 2)])
            .build()
            .unwrap();
        let resp = serve(&lenient, get(&[oid!(1, 1), oid!(1, 2)]));
        assert_eq!(resp.status(), ErrorStatus::NoError);
        assert_eq!(resp.varbinds.len(), 2);
        assert_eq!(
            resp.varbinds[0].value,
            Value::OctetString(Bytes::from_static(b"ERROR: panic: policy store down"))
        );
        assert_eq!(resp.varbinds[1].value, Value::Integer(2));

        let strict = Scope::builder()
            .variables([guarded, int(oid!(1, 2), 2)])
            .escalate_errors(true)
            .build()
            .unwrap();
        let resp = serve(&strict, get(&[oid!(1, 1), oid!(1, 2)]));
        assert_eq!(resp.status(), ErrorStatus::GenErr);
        assert_eq!(resp.error_index, 1);
        assert_eq!(resp.varbinds.len(), 2);
    }

    #[test]
    fn test_get_without_read_is_resource_unavailable() {
        let write_only = VariableControl::builder(oid!(1, 1), ValueType::Integer)
            .on_write(|_| Ok(()))
            .build();
        let scope = Scope::builder().variable(write_only).build().unwrap();
        let resp = serve(&scope, get(&[oid!(1, 1)]));
        assert_eq!(resp.status(), ErrorStatus::ResourceUnavailable);
        assert_eq!(resp.varbinds[0].value, Value::Null);
    }

    #[test]
    fn test_failing_read_substitutes_error_string() {
        let broken = VariableControl::builder(oid!(1, 1), ValueType::Integer)
            .on_read(|| panic!("sensor unplugged"))
            .build();
        let lenient = Scope::builder().variable(broken.clone()).build().unwrap();
        let resp = serve(&lenient, get(&[oid!(1, 1)]));
        assert_eq!(resp.status(), ErrorStatus::NoError);
        assert_eq!(
            resp.varbinds[0].value,
            Value::OctetString(Bytes::from_static(b"ERROR: panic: sensor unplugged"))
        );

        let strict = Scope::builder()
            .variable(broken)
            .escalate_errors(true)
            .build()
            .unwrap();
        let resp = serve(&strict, get(&[oid!(1, 1)]));
        assert_eq!(resp.status(), ErrorStatus::GenErr);
        assert_eq!(resp.error_index, 1);
    }

    #[test]
    fn test_get_next_end_of_mib() {
        let scope = Scope::builder()
            .variables([int(oid!(1, 1), 1), int(oid!(1, 2), 2)])
            .build()
            .unwrap();
        let req = Pdu::new(
            PduType::GetNextRequest,
            3,
            vec![VarBind::null(oid!(1, 1)), VarBind::null(oid!(1, 2))],
        );
        let resp = serve(&scope, req);
        assert_eq!(resp.status(), ErrorStatus::NoError);
        assert_eq!(resp.varbinds[0], VarBind::new(oid!(1, 2), Value::Integer(2)));
        assert_eq!(resp.varbinds[1], VarBind::new(oid!(1, 2), Value::EndOfMibView));
    }

    #[test]
    fn test_bulk_layout_is_repetition_major() {
        let scope = Scope::builder()
            .variables([
                int(oid!(1, 1), 1),
                int(oid!(1, 2), 2),
                int(oid!(2, 1), 3),
                int(oid!(2, 2), 4),
            ])
            .build()
            .unwrap();
        let req = Pdu::get_bulk(
            4,
            1,
            2,
            vec![
                VarBind::null(oid!(0)),
                VarBind::null(oid!(1)),
                VarBind::null(oid!(2)),
            ],
        );
        let resp = serve(&scope, req);
        let oids: Vec<String> = resp.varbinds.iter().map(|vb| vb.oid.to_string()).collect();
        assert_eq!(oids, ["1.1", "1.1", "2.1", "1.2", "2.2"]);
    }

    #[test]
    fn test_bulk_single_end_of_mib_per_query() {
        let scope = Scope::builder().variable(int(oid!(1, 1), 1)).build().unwrap();
        let req = Pdu::get_bulk(
            5,
            1,
            10,
            vec![VarBind::null(oid!(1)), VarBind::null(oid!(1))],
        );
        let resp = serve(&scope, req);
        let ends = resp
            .varbinds
            .iter()
            .filter(|vb| vb.value == Value::EndOfMibView)
            .count();
        assert_eq!(resp.varbinds.len(), 3);
        assert_eq!(resp.varbinds[0].value, Value::Integer(1));
        assert_eq!(resp.varbinds[1].value, Value::Integer(1));
        assert_eq!(ends, 1);
    }

    #[test]
    fn test_response_pdu_is_unsupported() {
        let scope = Scope::builder().build().unwrap();
        let pdu = Pdu::new(PduType::Response, 1, vec![]);
        let err = scope.serve(&ctx(PduType::Response), &pdu).unwrap_err();
        assert!(matches!(err, Error::UnsupportedOperation { .. }));
    }
}
