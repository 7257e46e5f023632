//! Trap and inform handling.

use crate::error::ErrorStatus;
use crate::handler::{RequestContext, ResponseBuilder};
use crate::oid::Oid;
use crate::pdu::{Pdu, PduType};
use crate::value::Value;
use crate::varbind::VarBind;

use super::Scope;

/// sysUpTime.0, the first binding of every SNMPv2 notification.
const SYS_UPTIME: &[u32] = &[1, 3, 6, 1, 2, 1, 1, 3, 0];
/// snmpTrapOID.0, the second binding of every SNMPv2 notification.
const SNMP_TRAP_OID: &[u32] = &[1, 3, 6, 1, 6, 3, 1, 1, 4, 1, 0];

fn is_notification_header(oid: &Oid) -> bool {
    oid.arcs() == SYS_UPTIME || oid.arcs() == SNMP_TRAP_OID
}

impl Scope {
    /// Deliver a notification to the registered notify callbacks.
    ///
    /// Only an InformRequest gets a response. For traps the bindings are
    /// still handed to the callbacks, and the assembled response is dropped.
    pub(super) fn notify(&self, ctx: &RequestContext, pdu: &Pdu) -> Option<Pdu> {
        let is_inform = pdu.pdu_type == PduType::InformRequest;
        let mut resp = ResponseBuilder::with_capacity(pdu.varbinds.len());

        for (index, vb) in pdu.varbinds.iter().enumerate() {
            let Some(control) = self.registry().get(&vb.oid) else {
                if is_notification_header(&vb.oid) {
                    resp.push(vb.clone());
                } else {
                    resp.fail(
                        ErrorStatus::NoSuchName,
                        index,
                        VarBind::new(vb.oid.clone(), Value::NoSuchInstance),
                    );
                }
                continue;
            };

            if !self.permitted(&mut resp, ctx, index, control) {
                continue;
            }

            match control.notify(is_inform, vb) {
                Some(Ok(Some(value))) => resp.push(VarBind::new(vb.oid.clone(), value)),
                Some(Ok(None)) => resp.push(vb.clone()),
                Some(Err(err)) => self.substitute(&mut resp, &err, index, &vb.oid),
                None => resp.fail(
                    ErrorStatus::ResourceUnavailable,
                    index,
                    VarBind::null(vb.oid.clone()),
                ),
            }
        }

        if !is_inform {
            tracing::debug!(
                snmp.pdu_type = %pdu.pdu_type,
                snmp.status = %resp.status(),
                "trap handled, no reply"
            );
            return None;
        }
        Some(resp.into_response(pdu))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::agent::scope::tests::ctx;
    use crate::handler::VariableControl;
    use crate::oid;
    use crate::value::ValueType;

    fn link_down(seen: Arc<Mutex<Vec<bool>>>) -> VariableControl {
        VariableControl::builder(oid!(1, 3, 6, 1, 4, 1, 9, 1), ValueType::Integer)
            .on_notify(move |is_inform, vb| {
                seen.lock().unwrap().push(is_inform);
                match vb.value {
                    Value::Integer(n) => Ok(Some(Value::Integer(n + 1))),
                    _ => Ok(None),
                }
            })
            .build()
    }

    fn notification(pdu_type: PduType) -> Pdu {
        Pdu::new(
            pdu_type,
            21,
            vec![
                VarBind::new(Oid::from_slice(SYS_UPTIME), Value::TimeTicks(1234)),
                VarBind::new(
                    Oid::from_slice(SNMP_TRAP_OID),
                    Value::ObjectIdentifier(oid!(1, 3, 6, 1, 6, 3, 1, 1, 5, 3)),
                ),
                VarBind::new(oid!(1, 3, 6, 1, 4, 1, 9, 1), Value::Integer(4)),
            ],
        )
    }

    #[test]
    fn test_inform_gets_response() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let scope = Scope::builder()
            .variable(link_down(seen.clone()))
            .build()
            .unwrap();
        let pdu = notification(PduType::InformRequest);
        let resp = scope
            .serve(&ctx(PduType::InformRequest), &pdu)
            .unwrap()
            .unwrap();
        assert_eq!(resp.pdu_type, PduType::Response);
        assert_eq!(resp.status(), ErrorStatus::NoError);
        assert_eq!(resp.varbinds[0], pdu.varbinds[0]);
        assert_eq!(resp.varbinds[1], pdu.varbinds[1]);
        assert_eq!(resp.varbinds[2].value, Value::Integer(5));
        assert_eq!(*seen.lock().unwrap(), vec![true]);
    }

    #[test]
    fn test_trap_runs_callbacks_without_reply() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let scope = Scope::builder()
            .variable(link_down(seen.clone()))
            .build()
            .unwrap();
        let pdu = notification(PduType::TrapV2);
        assert!(scope.serve(&ctx(PduType::TrapV2), &pdu).unwrap().is_none());
        assert_eq!(*seen.lock().unwrap(), vec![false]);
    }

    #[test]
    fn test_inform_without_notify_callback() {
        let scope = Scope::builder()
            .variable(
                VariableControl::builder(oid!(1, 3, 6, 1, 4, 1, 9, 1), ValueType::Integer)
                    .constant(Value::Integer(0))
                    .build(),
            )
            .build()
            .unwrap();
        let pdu = notification(PduType::InformRequest);
        let resp = scope
            .serve(&ctx(PduType::InformRequest), &pdu)
            .unwrap()
            .unwrap();
        assert_eq!(resp.status(), ErrorStatus::ResourceUnavailable);
        assert_eq!(resp.error_index, 3);
    }

    #[test]
    fn test_panicking_notify_keeps_every_binding() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let broken = VariableControl::builder(oid!(1, 3, 6, 1, 4, 1, 9, 2), ValueType::Integer)
            .on_notify(|_, _| panic!("handler crashed"))
            .build();
        let mut pdu = notification(PduType::InformRequest);
        pdu.varbinds
            .push(VarBind::new(oid!(1, 3, 6, 1, 4, 1, 9, 2), Value::Integer(7)));

        let lenient = Scope::builder()
            .variables([link_down(seen.clone()), broken.clone()])
            .build()
            .unwrap();
        let resp = lenient
            .serve(&ctx(PduType::InformRequest), &pdu)
            .unwrap()
            .unwrap();
        assert_eq!(resp.status(), ErrorStatus::NoError);
        assert_eq!(resp.varbinds.len(), 4);
        assert_eq!(resp.varbinds[2].value, Value::Integer(5));
        assert_eq!(resp.varbinds[3].oid, oid!(1, 3, 6, 1, 4, 1, 9, 2));
        assert_eq!(
            resp.varbinds[3].value,
            Value::OctetString("ERROR: panic: handler crashed".into())
        );

        let strict = Scope::builder()
            .variables([link_down(seen.clone()), broken])
            .escalate_errors(true)
            .build()
            .unwrap();
        let resp = strict
            .serve(&ctx(PduType::InformRequest), &pdu)
            .unwrap()
            .unwrap();
        assert_eq!(resp.status(), ErrorStatus::GenErr);
        assert_eq!(resp.error_index, 4);
        assert_eq!(resp.varbinds.len(), 4);
        assert_eq!(*seen.lock().unwrap(), vec![true, true]);
    }
}
