#![no_main]

use libfuzzer_sys::fuzz_target;
use protocol_registry::core::serialization::SerdeCodec;
use protocol_registry::protocol::{NullObserver, Protocol};
use protocol_registry::registry::{MessageType, Opcode, TypedMessage};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
struct Chat {
    channel: u32,
    text: String,
}

impl TypedMessage for Chat {
    const MESSAGE_TYPE: MessageType = MessageType::from_static("chat");
}

fuzz_target!(|data: &[u8]| {
    // Arbitrary opcode + payload must never panic or grow the table
    if data.len() < 4 {
        return;
    }
    let Ok(protocol) = Protocol::builder("fuzz", 4000, 16)
        .observer(NullObserver)
        .reserve_static(Chat::MESSAGE_TYPE, Opcode::new(3), SerdeCodec::<Chat>::default())
        .build()
    else {
        return;
    };

    let opcode = Opcode::new(u32::from_le_bytes([data[0], data[1], data[2], data[3]]));
    let _ = protocol.receive(opcode, &data[4..]);
    assert_eq!(protocol.codecs().len().unwrap_or(1), 1);
});
