#![no_main]

use std::sync::LazyLock;

use bytes::Bytes;
use libfuzzer_sys::fuzz_target;

use async_snmp_agent::codec::{BerCodec, Codec};
use async_snmp_agent::pdu::Pdu;
use async_snmp_agent::v3::{AuthProtocol, PrivProtocol, UsmUser};

static USER: LazyLock<UsmUser> = LazyLock::new(|| {
    UsmUser::new("fuzz")
        .auth(AuthProtocol::Sha1, "authpassword")
        .privacy(PrivProtocol::Aes128, "privpassword")
});

fuzz_target!(|data: &[u8]| {
    let bytes = Bytes::copy_from_slice(data);

    // Unauthenticated decode, as done before the user is known
    if let Err(failure) = BerCodec.decode(&bytes, None) {
        let _ = failure.partial.map(|params| params.user_name_lossy().into_owned());
    }

    // Decode with keys: MAC verification and decryption paths
    let _ = BerCodec.decode(&bytes, Some(&USER));

    // PDU decoder alone
    let mut decoder = async_snmp_agent::ber::Decoder::new(bytes);
    let _ = Pdu::decode(&mut decoder);
});
