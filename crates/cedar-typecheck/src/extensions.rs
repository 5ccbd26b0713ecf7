//! The fixed extension-function signature table (constructors plus
//! methods on `ipaddr`, `decimal`, `datetime`, `duration`).

use cedar_types::InternalType;

pub struct ExtensionSig {
    pub params: Vec<InternalType>,
    pub ret: InternalType,
}

fn ext(name: &str) -> InternalType {
    InternalType::Extension(name.to_string())
}

/// Look up an extension function's signature by name, if it's one of the
/// fixed set the schema knows about.
pub fn lookup(name: &str) -> Option<ExtensionSig> {
    let sig = |params: Vec<InternalType>, ret: InternalType| ExtensionSig { params, ret };
    match name {
        "ip" => Some(sig(vec![InternalType::String], ext("ipaddr"))),
        "decimal" => Some(sig(vec![InternalType::String], ext("decimal"))),
        "datetime" => Some(sig(vec![InternalType::String], ext("datetime"))),
        "duration" => Some(sig(vec![InternalType::String], ext("duration"))),
        "lessThan" | "lessThanOrEqual" | "greaterThan" | "greaterThanOrEqual" => {
            Some(sig(vec![ext("decimal"), ext("decimal")], InternalType::Bool))
        }
        "isIpv4" | "isIpv6" | "isLoopback" | "isMulticast" => {
            Some(sig(vec![ext("ipaddr")], InternalType::Bool))
        }
        "isInRange" => Some(sig(vec![ext("ipaddr"), ext("ipaddr")], InternalType::Bool)),
        "toDate" => Some(sig(vec![ext("datetime")], ext("datetime"))),
        "toTime" => Some(sig(vec![ext("datetime")], ext("duration"))),
        "offset" => Some(sig(vec![ext("datetime"), ext("duration")], ext("datetime"))),
        "durationSince" => Some(sig(vec![ext("datetime"), ext("datetime")], ext("duration"))),
        "toDays" | "toHours" | "toMinutes" | "toSeconds" | "toMilliseconds" => {
            Some(sig(vec![ext("duration")], InternalType::Long))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constructor_takes_a_string_and_returns_its_extension_type() {
        let sig = lookup("ip").unwrap();
        assert_eq!(sig.params, vec![InternalType::String]);
        assert_eq!(sig.ret, InternalType::Extension("ipaddr".to_string()));
    }

    #[test]
    fn unknown_name_is_none() {
        assert!(lookup("frobnicate").is_none());
    }
}
