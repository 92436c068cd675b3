use autolight::apds9930::{reg, Apds9930, Channels, Enable};
use autolight::bus::Ack;
use autolight::config::DeviceConfig;
use autolight::{Error, Stage};

use crate::mock_hw::{BusEvent, SimulatedApds};

const WRITE: u8 = 0x39 << 1;
const READ: u8 = (0x39 << 1) | 1;

fn sensor() -> Apds9930<SimulatedApds> {
    Apds9930::new(SimulatedApds::new())
}

#[test]
fn register_read_uses_repeated_start() {
    let mut sensor = sensor();
    assert_eq!(sensor.read_register(reg::ID), Ok(0x39));
    assert_eq!(
        sensor.bus().events,
        [
            BusEvent::Start,
            BusEvent::Write(WRITE, Ack::Ack),
            BusEvent::Write(0xB2, Ack::Ack),
            BusEvent::Start,
            BusEvent::Write(READ, Ack::Ack),
            BusEvent::Read(0x39, Ack::Nack),
            BusEvent::Stop,
        ]
    );
}

#[test]
fn register_write_is_one_transaction() {
    let mut sensor = sensor();
    assert_eq!(sensor.write_register(reg::ATIME, 0xED), Ok(()));
    assert_eq!(
        sensor.bus().events,
        [
            BusEvent::Start,
            BusEvent::Write(WRITE, Ack::Ack),
            BusEvent::Write(0xA1, Ack::Ack),
            BusEvent::Write(0xED, Ack::Ack),
            BusEvent::Stop,
        ]
    );
    assert_eq!(sensor.bus().register(reg::ATIME), 0xED);
}

#[test]
fn failed_address_aborts_write_before_data() {
    let mut device = SimulatedApds::new();
    device.present = false;
    let mut sensor = Apds9930::new(device);

    assert_eq!(
        sensor.write_register(reg::ATIME, 0xED),
        Err(Error::Nack(Stage::Address))
    );
    assert_eq!(
        sensor.bus().events,
        [
            BusEvent::Start,
            BusEvent::Write(WRITE, Ack::Nack),
            BusEvent::Stop,
        ]
    );
}

#[test]
fn rejected_data_byte_fails_write() {
    let mut device = SimulatedApds::new();
    device.nack_byte = Some(0xED);
    let mut sensor = Apds9930::new(device);

    assert_eq!(
        sensor.write_register(reg::ATIME, 0xED),
        Err(Error::Nack(Stage::Data))
    );
    let bus = sensor.bus();
    assert_eq!(bus.starts(), 1);
    assert_eq!(bus.stops(), 1);
    assert!(bus.is_idle());
    assert_eq!(bus.register(reg::ATIME), 0);
}

#[test]
fn failed_register_byte_aborts_read() {
    let mut device = SimulatedApds::new();
    device.nack_byte = Some(0xB2);
    let mut sensor = Apds9930::new(device);

    assert_eq!(
        sensor.read_register(reg::ID),
        Err(Error::Nack(Stage::Register))
    );
    let bus = sensor.bus();
    assert_eq!(bus.starts(), 1);
    assert_eq!(bus.stops(), 1);
    assert!(bus.is_idle());
    assert!(!bus.events.contains(&BusEvent::Write(READ, Ack::Ack)));
}

#[test]
fn failed_read_address_aborts_read() {
    let mut device = SimulatedApds::new();
    device.nack_byte = Some(READ);
    let mut sensor = Apds9930::new(device);

    assert_eq!(
        sensor.read_register(reg::PDATAL),
        Err(Error::Nack(Stage::ReadAddress))
    );
    assert_eq!(sensor.bus().stops(), 1);
    assert!(sensor.bus().is_idle());
}

#[test]
fn clear_interrupt_is_a_command_without_data() {
    let mut device = SimulatedApds::new();
    device.interrupt_latched = true;
    let mut sensor = Apds9930::new(device);

    assert_eq!(sensor.clear_proximity_interrupt(), Ok(()));
    assert_eq!(
        sensor.bus().events,
        [
            BusEvent::Start,
            BusEvent::Write(WRITE, Ack::Ack),
            BusEvent::Write(0xE5, Ack::Ack),
            BusEvent::Stop,
        ]
    );
    assert!(!sensor.bus().interrupt_latched);
}

#[test]
fn ambient_light_reads_each_byte_separately() {
    let mut device = SimulatedApds::new();
    device.set_channels(200, 50);
    let mut sensor = Apds9930::new(device);

    assert_eq!(sensor.read_ambient_light(100), Ok(100));

    let bus = sensor.bus();
    assert_eq!(bus.stops(), 4);
    let commands: Vec<u8> = bus
        .events
        .windows(2)
        .filter_map(|pair| match pair {
            [BusEvent::Write(WRITE, _), BusEvent::Write(command, _)] => Some(*command),
            _ => None,
        })
        .collect();
    assert_eq!(commands, [0xB4, 0xB5, 0xB6, 0xB7]);
}

#[test]
fn channels_are_reassembled_low_byte_first() {
    let mut device = SimulatedApds::new();
    device.set_channels(0x1234, 0x0056);
    let mut sensor = Apds9930::new(device);
    assert_eq!(
        sensor.read_channels(),
        Ok(Channels {
            ch0: 0x1234,
            ch1: 0x0056
        })
    );
}

#[test]
fn infrared_heavy_reading_is_dark() {
    let mut device = SimulatedApds::new();
    device.set_channels(10, 20);
    let mut sensor = Apds9930::new(device);
    assert_eq!(sensor.read_ambient_light(100), Ok(0));
}

#[test]
fn proximity_is_two_single_byte_reads() {
    let mut device = SimulatedApds::new();
    device.set_proximity(0x0123);
    let mut sensor = Apds9930::new(device);

    assert_eq!(sensor.read_proximity(), Ok(0x0123));
    assert_eq!(sensor.bus().stops(), 2);
}

#[test]
fn init_programs_device_defaults() {
    let mut device = SimulatedApds::new();
    device.interrupt_latched = true;
    let mut sensor = Apds9930::new(device);
    let config = DeviceConfig::DEFAULT;

    assert_eq!(sensor.init(&config), Ok(()));

    let bus = sensor.bus();
    assert!(!bus.interrupt_latched);
    assert_eq!(bus.register(reg::ATIME), 0xED);
    assert_eq!(bus.register(reg::PTIME), 0xFF);
    assert_eq!(bus.register(reg::WTIME), 0xB6);
    assert_eq!(bus.register(reg::PPULSE), 4);
    assert_eq!(bus.register(reg::CONTROL), 0xA1);
    assert_eq!(bus.register(reg::PILTL), 30);
    assert_eq!(bus.register(reg::PILTH), 0);
    assert_eq!(bus.register(reg::PIHTL), 0);
    assert_eq!(bus.register(reg::PIHTH), 0);
    assert_eq!(bus.register(reg::PERS), 0x30);
    assert_eq!(
        bus.register(reg::ENABLE),
        (Enable::WEN | Enable::PEN | Enable::PON).bits()
    );
    // identification read uses a repeated start
    assert_eq!(bus.stops(), 14);
    assert_eq!(bus.starts(), 15);
    assert!(bus.is_idle());
}

#[test]
fn init_rejects_unknown_part() {
    let mut device = SimulatedApds::new();
    device.registers[usize::from(reg::ID)] = 0x30;
    let mut sensor = Apds9930::new(device);

    assert_eq!(
        sensor.init(&DeviceConfig::DEFAULT),
        Err(Error::UnexpectedId(0x30))
    );
    assert_eq!(sensor.bus().register(reg::ENABLE), 0);
}

#[test]
fn init_stops_at_first_failed_write() {
    let mut device = SimulatedApds::new();
    // command byte of the CONTROL register
    device.nack_byte = Some(0xAF);
    let mut sensor = Apds9930::new(device);

    assert_eq!(
        sensor.init(&DeviceConfig::DEFAULT),
        Err(Error::Nack(Stage::Register))
    );
    let bus = sensor.bus();
    assert!(bus.is_idle());
    assert_eq!(bus.register(reg::PPULSE), 4);
    assert_eq!(bus.register(reg::PILTL), 0);
    assert_eq!(bus.register(reg::ENABLE), 0);
}
