#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
//! Registry edge cases: exhaustion, unknown opcodes, missing handlers, handler
//! failures, and deterministic allocation across independent instances.

use protocol_registry::core::serialization::SerdeCodec;
use protocol_registry::error::{ProtocolError, Result};
use protocol_registry::protocol::{typed_handler, NullObserver, Protocol, ProtocolBuilder};
use protocol_registry::registry::{downcast_ref, Message, MessageType, Opcode, TypedMessage};
use serde::{Deserialize, Serialize};

macro_rules! message {
    ($name:ident, $tag:literal) => {
        #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
        struct $name {
            n: u32,
        }

        impl TypedMessage for $name {
            const MESSAGE_TYPE: MessageType = MessageType::from_static($tag);
        }
    };
}

message!(Ping, "ping");
message!(Pong, "pong");
message!(A, "a");
message!(B, "b");
message!(C, "c");

fn symmetric(max_opcode: u32) -> ProtocolBuilder {
    Protocol::builder("symmetric", 4000, max_opcode)
        .observer(NullObserver)
        .reserve_static(Ping::MESSAGE_TYPE, Opcode::new(0), SerdeCodec::<Ping>::default())
        .reserve_static(Pong::MESSAGE_TYPE, Opcode::new(2), SerdeCodec::<Pong>::default())
        .codec(A::MESSAGE_TYPE, SerdeCodec::<A>::default())
        .codec(B::MESSAGE_TYPE, SerdeCodec::<B>::default())
        .codec(C::MESSAGE_TYPE, SerdeCodec::<C>::default())
}

// ============================================================================
// END-TO-END
// ============================================================================

#[test]
fn test_ping_static_pong_dynamic() {
    let protocol = Protocol::builder("e2e", 4000, 4)
        .observer(NullObserver)
        .reserve_static(Ping::MESSAGE_TYPE, Opcode::new(0), SerdeCodec::<Ping>::default())
        .codec(Pong::MESSAGE_TYPE, SerdeCodec::<Pong>::default())
        .build()
        .unwrap();

    let ping = protocol.encode(&Ping { n: 1 }).unwrap();
    assert_eq!(ping.opcode, Opcode::new(0));
    assert_eq!(protocol.metrics().snapshot().dynamic_allocations, 0);

    let pong = protocol.encode(&Pong { n: 2 }).unwrap();
    assert_eq!(pong.opcode, Opcode::new(1));

    let binding = protocol.resolve_for_decode(Opcode::new(1)).unwrap();
    assert_eq!(binding.message_type(), &Pong::MESSAGE_TYPE);

    let decoded = protocol.decode(Opcode::new(1), &pong.payload).unwrap();
    assert_eq!(downcast_ref::<Pong>(decoded.as_ref()), Some(&Pong { n: 2 }));

    assert_eq!(
        protocol.decode(Opcode::new(3), &pong.payload).unwrap_err(),
        ProtocolError::UnknownOpcode(Opcode::new(3))
    );
}

// ============================================================================
// DETERMINISM
// ============================================================================

#[test]
fn test_identical_first_use_order_converges() {
    let client = symmetric(16).build().unwrap();
    let server = symmetric(16).build().unwrap();

    // Client first-encodes A, B, C.
    let client_opcodes = [
        client.encode(&A { n: 0 }).unwrap().opcode,
        client.encode(&B { n: 0 }).unwrap().opcode,
        client.encode(&C { n: 0 }).unwrap().opcode,
    ];

    // Server touches them in the same order without sending anything.
    let server_opcodes = [
        server.opcode_for(&A::MESSAGE_TYPE).unwrap(),
        server.opcode_for(&B::MESSAGE_TYPE).unwrap(),
        server.opcode_for(&C::MESSAGE_TYPE).unwrap(),
    ];

    // First, second and third free opcodes around the statics at 0 and 2.
    assert_eq!(client_opcodes, [Opcode::new(1), Opcode::new(3), Opcode::new(4)]);
    assert_eq!(client_opcodes, server_opcodes);
    assert_eq!(
        client.dynamic_bindings().unwrap(),
        server.dynamic_bindings().unwrap()
    );

    // Each side can decode what the other encodes.
    let encoded = client.encode(&C { n: 77 }).unwrap();
    let decoded = server.decode(encoded.opcode, &encoded.payload).unwrap();
    assert_eq!(downcast_ref::<C>(decoded.as_ref()), Some(&C { n: 77 }));
}

#[test]
fn test_different_first_use_order_diverges() {
    let left = symmetric(16).build().unwrap();
    let right = symmetric(16).build().unwrap();

    left.opcode_for(&A::MESSAGE_TYPE).unwrap();
    right.opcode_for(&B::MESSAGE_TYPE).unwrap();

    assert_eq!(left.opcode_for(&A::MESSAGE_TYPE).unwrap(), Opcode::new(1));
    assert_eq!(right.opcode_for(&B::MESSAGE_TYPE).unwrap(), Opcode::new(1));
}

// ============================================================================
// EXHAUSTION
// ============================================================================

#[test]
fn test_statics_fill_space() {
    let protocol = Protocol::builder("full", 4000, 2)
        .observer(NullObserver)
        .reserve_static(Ping::MESSAGE_TYPE, Opcode::new(0), SerdeCodec::<Ping>::default())
        .reserve_static(Pong::MESSAGE_TYPE, Opcode::new(1), SerdeCodec::<Pong>::default())
        .codec(A::MESSAGE_TYPE, SerdeCodec::<A>::default())
        .build()
        .unwrap();

    assert_eq!(
        protocol.encode(&A { n: 0 }).unwrap_err(),
        ProtocolError::CapacityExceeded { max: 2 }
    );
    // Still exhausted on retry, and statics keep working.
    assert_eq!(
        protocol.opcode_for(&A::MESSAGE_TYPE).unwrap_err(),
        ProtocolError::CapacityExceeded { max: 2 }
    );
    assert_eq!(protocol.encode(&Pong { n: 0 }).unwrap().opcode, Opcode::new(1));
    assert_eq!(protocol.codecs().remaining().unwrap(), 0);
}

#[test]
fn test_dynamic_allocation_fills_space() {
    let protocol = symmetric(5).build().unwrap();

    assert_eq!(protocol.opcode_for(&A::MESSAGE_TYPE).unwrap(), Opcode::new(1));
    assert_eq!(protocol.opcode_for(&B::MESSAGE_TYPE).unwrap(), Opcode::new(3));
    assert_eq!(protocol.opcode_for(&C::MESSAGE_TYPE).unwrap(), Opcode::new(4));
    assert_eq!(protocol.codecs().remaining().unwrap(), 0);
}

// ============================================================================
// UNKNOWN OPCODES
// ============================================================================

#[test]
fn test_unknown_opcode_does_not_mutate() {
    let protocol = symmetric(16).build().unwrap();
    let before = protocol.codecs().bindings().unwrap().len();

    for raw in [1u32, 3, 15, 16, u32::MAX] {
        assert_eq!(
            protocol.decode(Opcode::new(raw), &[1, 2, 3]).unwrap_err(),
            ProtocolError::UnknownOpcode(Opcode::new(raw))
        );
    }

    assert_eq!(protocol.codecs().bindings().unwrap().len(), before);
    assert!(protocol.dynamic_bindings().unwrap().is_empty());
    // The first dynamic opcode is still the first free one.
    assert_eq!(protocol.opcode_for(&A::MESSAGE_TYPE).unwrap(), Opcode::new(1));
}

#[test]
fn test_unknown_opcode_is_recoverable() {
    let protocol = symmetric(16).build().unwrap();
    let err = protocol.receive(Opcode::new(9), &[]).unwrap_err();
    assert!(err.is_recoverable());

    let ping = protocol.encode(&Ping { n: 5 }).unwrap();
    assert!(protocol.decode(ping.opcode, &ping.payload).is_ok());
}

#[test]
fn test_truncated_payload_is_deserialize_error() {
    let protocol = symmetric(16).build().unwrap();
    assert!(matches!(
        protocol.decode(Opcode::new(0), &[0x01]),
        Err(ProtocolError::DeserializeError(_))
    ));
}

// ============================================================================
// DISPATCH
// ============================================================================

#[test]
fn test_no_handler() {
    let protocol = symmetric(16)
        .handler(Ping::MESSAGE_TYPE, typed_handler(|_: &Ping| Ok(())))
        .build()
        .unwrap();

    let pong = protocol.encode(&Pong { n: 1 }).unwrap();
    let decoded = protocol.decode(pong.opcode, &pong.payload).unwrap();

    assert_eq!(
        protocol.dispatch(decoded.as_ref()).unwrap_err(),
        ProtocolError::NoHandler(Pong::MESSAGE_TYPE)
    );
    assert!(matches!(
        protocol.handler_for(&Pong::MESSAGE_TYPE),
        Err(ProtocolError::NoHandler(_))
    ));
    assert!(protocol.handler_for(&Ping::MESSAGE_TYPE).is_ok());
}

#[test]
fn test_handler_error_propagates_unchanged() {
    let failing = |message: &dyn Message| -> Result<()> {
        Err(ProtocolError::Handler(format!("rejected {}", message.message_type())))
    };
    let protocol = symmetric(16)
        .handler(Ping::MESSAGE_TYPE, failing)
        .build()
        .unwrap();

    let ping = protocol.encode(&Ping { n: 1 }).unwrap();
    assert_eq!(
        protocol.receive(ping.opcode, &ping.payload).unwrap_err(),
        ProtocolError::Handler("rejected ping".to_string())
    );

    // The protocol keeps working after a handler failure.
    assert!(protocol.encode(&Ping { n: 2 }).is_ok());
}

#[test]
fn test_handler_sees_decoded_value() {
    let protocol = symmetric(16)
        .handler(
            A::MESSAGE_TYPE,
            typed_handler(|a: &A| {
                if a.n == 42 {
                    Ok(())
                } else {
                    Err(ProtocolError::Handler(format!("unexpected {}", a.n)))
                }
            }),
        )
        .build()
        .unwrap();

    let encoded = protocol.encode(&A { n: 42 }).unwrap();
    protocol.receive(encoded.opcode, &encoded.payload).unwrap();
}
