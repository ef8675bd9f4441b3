use protocol_registry::core::serialization::SerdeCodec;
use protocol_registry::error::ProtocolError;
use protocol_registry::protocol::{NullObserver, Protocol};
use protocol_registry::registry::{MessageType, Opcode, TypedMessage};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
struct Blob(Vec<u8>);

impl TypedMessage for Blob {
    const MESSAGE_TYPE: MessageType = MessageType::from_static("blob");
}

#[test]
fn stress_fill_large_opcode_space() {
    // One static reservation at the top, every other opcode handed out dynamically.
    const MAX: u32 = 4096;
    let mut builder = Protocol::builder("stress", 4000, MAX)
        .observer(NullObserver)
        .reserve_static(Blob::MESSAGE_TYPE, Opcode::new(MAX - 1), SerdeCodec::<Blob>::default());
    for i in 0..MAX {
        builder = builder.codec(MessageType::new(format!("t{i}")), SerdeCodec::<Blob>::default());
    }
    let protocol = builder.build().unwrap();

    for i in 0..MAX - 1 {
        let opcode = protocol.opcode_for(&MessageType::new(format!("t{i}"))).unwrap();
        assert_eq!(opcode, Opcode::new(i));
    }

    assert_eq!(
        protocol.opcode_for(&MessageType::new(format!("t{}", MAX - 1))),
        Err(ProtocolError::CapacityExceeded { max: MAX })
    );

    // Traffic on existing bindings is unaffected by exhaustion.
    for size in [0usize, 1, 64, 4096, 65536] {
        let encoded = protocol.encode(&Blob(vec![0xAB; size])).unwrap();
        assert_eq!(encoded.opcode, Opcode::new(MAX - 1));
        assert!(protocol.decode(encoded.opcode, &encoded.payload).is_ok());
    }
}
