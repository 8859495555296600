use i2cseq::{
    Address, CompileError, CompileOptions, Direction, EmptySegmentPolicy, SendError,
    bus::{BusError, MemoryBus, RegisterDevice, memory::TransferRecord},
    compiler::read_len,
    notation::parse_sequence,
    orchestrator::send_wire,
    send_sequence,
    sequence::SequenceBuilder,
    token::{WIRE_READ, WIRE_RESTART},
};
use pretty_assertions::assert_eq;

fn address(raw: u8) -> Address {
    Address::new(raw).expect("valid address")
}

/// A light sensor at 0x38 with its part number at register 0x8a
fn light_sensor_bus() -> MemoryBus {
    let mut bus = MemoryBus::new();
    bus.attach(address(0x38), RegisterDevice::with_registers(0x8a, &[0x14]));
    bus
}

#[test]
fn test_part_number_query() {
    let mut bus = light_sensor_bus();
    let mut status = [0; 1];

    let tokens = parse_sequence("0x70 0x8a restart 0x71 read").unwrap();
    let transferred =
        send_sequence(&mut bus, &tokens, &mut status, CompileOptions::default()).unwrap();

    assert_eq!(transferred, 2);
    assert_eq!(status, [0x14]);
}

#[test]
fn test_init_sequences_update_registers() {
    let mut bus = light_sensor_bus();
    let mut unused: [u8; 0] = [];

    for text in ["0x70 0x80 3", "0x70 0x81 3"] {
        let tokens = parse_sequence(text).unwrap();
        send_sequence(&mut bus, &tokens, &mut unused, CompileOptions::default()).unwrap();
    }

    let device = bus.device(address(0x38)).unwrap();
    assert_eq!(device.register(0x80), 3);
    assert_eq!(device.register(0x81), 3);
}

#[test]
fn test_repeated_queries_see_device_updates() {
    let mut bus = light_sensor_bus();
    let tokens = parse_sequence("0x70 0x8a restart 0x71 read").unwrap();
    let mut status = [0; 1];

    send_sequence(&mut bus, &tokens, &mut status, CompileOptions::default()).unwrap();
    assert_eq!(status, [0x14]);

    bus.device_mut(address(0x38)).unwrap().set_register(0x8a, 0x15);
    send_sequence(&mut bus, &tokens, &mut status, CompileOptions::default()).unwrap();
    assert_eq!(status, [0x15]);
    assert_eq!(bus.transactions().len(), 2);
}

#[test]
fn test_wire_encoded_sequence() {
    let mut bus = light_sensor_bus();
    let mut status = [0; 1];

    let transferred = send_wire(
        &mut bus,
        &[0x70, 0x8a, WIRE_RESTART, 0x71, WIRE_READ],
        &mut status,
        CompileOptions::default(),
    )
    .unwrap();

    assert_eq!(transferred, 2);
    assert_eq!(status, [0x14]);
}

#[test]
fn test_segments_execute_in_sequence_order() {
    // The read is only meaningful because the write before it already landed
    let sensor = address(0x1c);
    let mut bus = MemoryBus::new();
    bus.attach(sensor, RegisterDevice::new());

    let mut builder = SequenceBuilder::new();
    builder
        .write(sensor, &[0x20, 0xde, 0xad])
        .write(sensor, &[0x20])
        .read(sensor, 2);
    let tokens = builder.build();

    let mut received = vec![0; read_len(&tokens)];
    send_sequence(&mut bus, &tokens, &mut received, CompileOptions::default()).unwrap();
    assert_eq!(received, vec![0xde, 0xad]);

    assert_eq!(
        bus.transactions(),
        &[vec![
            TransferRecord {
                address: sensor,
                direction: Direction::Write,
                data: vec![0x20, 0xde, 0xad],
            },
            TransferRecord {
                address: sensor,
                direction: Direction::Write,
                data: vec![0x20],
            },
            TransferRecord {
                address: sensor,
                direction: Direction::Read,
                data: vec![0xde, 0xad],
            },
        ]]
    );
}

#[test]
fn test_reads_from_two_devices_fill_consecutive_slices() {
    let mut bus = MemoryBus::new();
    bus.attach(address(0x1c), RegisterDevice::with_registers(0x00, &[1, 2]));
    bus.attach(address(0x50), RegisterDevice::with_registers(0x10, &[3, 4, 5]));

    let mut builder = SequenceBuilder::new();
    builder
        .read_register(address(0x1c), 0x00, 2)
        .read_register(address(0x50), 0x10, 3);
    let tokens = builder.build();

    let mut received = [0; 5];
    let transferred =
        send_sequence(&mut bus, &tokens, &mut received, CompileOptions::default()).unwrap();

    assert_eq!(transferred, 4);
    assert_eq!(received, [1, 2, 3, 4, 5]);
}

#[test]
fn test_compile_errors_never_reach_the_bus() {
    let mut bus = light_sensor_bus();
    let mut received = [0; 1];

    let tokens = parse_sequence("0x70 0x8a restart").unwrap();
    let err = send_sequence(&mut bus, &tokens, &mut received, CompileOptions::default())
        .unwrap_err();

    assert!(matches!(
        err,
        SendError::Compile(CompileError::MissingAddress { index: 3 })
    ));
    assert!(bus.transactions().is_empty());
}

#[test]
fn test_empty_segment_policy_is_honored() {
    let mut bus = light_sensor_bus();
    let mut received = [0; 1];
    let tokens = parse_sequence("0x70 restart 0x71 read").unwrap();

    let options = CompileOptions {
        empty_segments: EmptySegmentPolicy::Reject,
    };
    let err = send_sequence(&mut bus, &tokens, &mut received, options).unwrap_err();
    assert!(matches!(
        err,
        SendError::Compile(CompileError::EmptySegment { segment: 0 })
    ));

    let transferred =
        send_sequence(&mut bus, &tokens, &mut received, CompileOptions::default()).unwrap();
    assert_eq!(transferred, 2);
}

#[test]
fn test_bus_errors_pass_through() {
    let mut bus = light_sensor_bus();
    let mut received = [0; 1];

    let tokens = parse_sequence("0xa0 0x00 restart 0xa1 read").unwrap();
    let err = send_sequence(&mut bus, &tokens, &mut received, CompileOptions::default())
        .unwrap_err();

    match err {
        SendError::Bus(BusError::NoAcknowledge { address }) => assert_eq!(address.get(), 0x50),
        other => panic!("expected a NACK, got {other:?}"),
    }
}
