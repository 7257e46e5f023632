//! The SNMPv2-MIB system group served by `asnmp-agent`.

use std::sync::{Arc, RwLock};
use std::time::Instant;

use crate::handler::{BoxError, VariableControl};
use crate::oid;
use crate::oid::Oid;
use crate::value::{Value, ValueType};

/// Largest value accepted for the writable `DisplayString` variables.
const MAX_DISPLAY_STRING: usize = 255;

/// Initial contents of the system group.
#[derive(Debug, Clone, Default)]
pub struct SystemInfo {
    pub descr: String,
    pub object_id: Option<Oid>,
    pub contact: String,
    pub name: String,
    pub location: String,
}

/// Build the system group variables.
///
/// `sysUpTime.0` counts from the call. `sysContact.0`, `sysName.0` and
/// `sysLocation.0` accept writes and keep them in memory.
pub fn system_group(info: SystemInfo) -> Vec<VariableControl> {
    let started = Instant::now();
    let object_id = info
        .object_id
        .unwrap_or_else(|| oid!(1, 3, 6, 1, 4, 1, 8072, 3, 2, 10));

    vec![
        VariableControl::builder(oid!(1, 3, 6, 1, 2, 1, 1, 1, 0), ValueType::OctetString)
            .constant(Value::OctetString(info.descr.into()))
            .document("sysDescr")
            .build(),
        VariableControl::builder(oid!(1, 3, 6, 1, 2, 1, 1, 2, 0), ValueType::ObjectIdentifier)
            .constant(Value::ObjectIdentifier(object_id))
            .document("sysObjectID")
            .build(),
        VariableControl::builder(oid!(1, 3, 6, 1, 2, 1, 1, 3, 0), ValueType::TimeTicks)
            .on_read(move || {
                let ticks = started.elapsed().as_millis() / 10;
                Ok(Value::TimeTicks(ticks as u32))
            })
            .document("sysUpTime")
            .build(),
        display_string(oid!(1, 3, 6, 1, 2, 1, 1, 4, 0), "sysContact", info.contact),
        display_string(oid!(1, 3, 6, 1, 2, 1, 1, 5, 0), "sysName", info.name),
        display_string(oid!(1, 3, 6, 1, 2, 1, 1, 6, 0), "sysLocation", info.location),
        VariableControl::builder(oid!(1, 3, 6, 1, 2, 1, 1, 7, 0), ValueType::Integer)
            .constant(Value::Integer(72))
            .document("sysServices")
            .build(),
    ]
}

fn display_string(oid: Oid, name: &str, initial: String) -> VariableControl {
    let cell = Arc::new(RwLock::new(initial));
    let reader = cell.clone();
    VariableControl::builder(oid, ValueType::OctetString)
        .on_read(move || {
            let text = reader.read().map_err(|e| e.to_string())?;
            Ok(Value::OctetString(text.clone().into()))
        })
        .on_write(move |value| {
            let text = value.as_bytes().ok_or("expected an OCTET STRING")?;
            if text.len() > MAX_DISPLAY_STRING {
                return Err(BoxError::from(format!(
                    "value of {} octets exceeds {}",
                    text.len(),
                    MAX_DISPLAY_STRING
                )));
            }
            *cell.write().map_err(|e| e.to_string())? = String::from_utf8_lossy(text).into_owned();
            Ok(())
        })
        .document(name)
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::Registry;

    #[test]
    fn test_system_group_layout() {
        let registry = Registry::new(system_group(SystemInfo {
            descr: "test agent".into(),
            ..Default::default()
        }))
        .unwrap();
        assert_eq!(registry.len(), 7);

        let names: Vec<&str> = registry.iter().map(|v| v.document()).collect();
        assert_eq!(
            names,
            [
                "sysDescr",
                "sysObjectID",
                "sysUpTime",
                "sysContact",
                "sysName",
                "sysLocation",
                "sysServices"
            ]
        );
        let writable: Vec<&str> = registry
            .iter()
            .filter(|v| v.is_writable())
            .map(|v| v.document())
            .collect();
        assert_eq!(writable, ["sysContact", "sysName", "sysLocation"]);
    }
}
