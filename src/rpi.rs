// MIT License
//
// Copyright (c) 2025 Ronan LE MEILLAT for SCTG Development
//
// Permission is hereby granted, free of charge, to any person obtaining a copy
// of this software and associated documentation files (the "Software"), to deal
// in the Software without restriction, including without limitation the rights
// to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
// copies of the Software, and to permit persons to whom the Software is
// furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in all
// copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
// FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
// AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
// LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
// OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
// SOFTWARE.

//! Raspberry Pi drivers
//!
//! - MAX31856 thermocouple amplifier on SPI, chip select on a GPIO line
//! - ADS1115 ADC reading the NTC divider over I2C
//! - VNH5019-style H-bridges on GPIO (enable, two direction inputs, optional fan)
//!
//! Duty is binary in this rig, so the enable and fan lines are plain outputs.

use crate::actuator::{ActuatorDriver, Polarity};
use crate::config::{ActuatorConfig, NtcConfig, RigConfig, ThermocoupleConfig};
use crate::controller::RigHardware;
use crate::error::HardwareError;
use crate::sensor::{ThermocoupleReader, VoltageReader};
use ads1x1x::{channel, Ads1x1x, FullScaleRange, TargetAddr};
use linux_embedded_hal::I2cdev;
use log::info;
use nb::block;
use rppal::gpio::{Gpio, OutputPin};
use rppal::spi::{Bus, Mode, SlaveSelect, Spi};

const REF_VOLTAGE: f64 = 4.096; // ADS1115 full scale range (V)

// MAX31856 registers
const MAX31856_CR0: u8 = 0x00;
const MAX31856_CR1: u8 = 0x01;
const MAX31856_LTCBH: u8 = 0x0C;
const MAX31856_WRITE: u8 = 0x80;
const MAX31856_CR0_AUTOCONVERT: u8 = 0x80;
const MAX31856_CR1_TYPE_K: u8 = 0x03;
const MAX31856_FAULT_OPEN: u8 = 0x01;

/// MAX31856 in automatic conversion mode
pub struct Max31856 {
    spi: Spi,
    cs: OutputPin,
}

impl Max31856 {
    pub fn new(gpio: &Gpio, config: &ThermocoupleConfig) -> Result<Self, HardwareError> {
        let bus = match config.spi_bus {
            0 => Bus::Spi0,
            1 => Bus::Spi1,
            2 => Bus::Spi2,
            other => {
                return Err(HardwareError::new(
                    "MAX31856",
                    format!("unsupported SPI bus {}", other),
                ))
            }
        };
        let spi = Spi::new(bus, SlaveSelect::Ss0, config.clock_hz, Mode::Mode1)
            .map_err(|e| HardwareError::new("MAX31856", e))?;
        let cs = gpio
            .get(config.cs_pin)
            .map_err(|e| HardwareError::new("MAX31856", e))?
            .into_output_high();

        let mut device = Self { spi, cs };
        device.write_register(MAX31856_CR1, MAX31856_CR1_TYPE_K)?;
        device.write_register(MAX31856_CR0, MAX31856_CR0_AUTOCONVERT)?;
        Ok(device)
    }

    fn write_register(&mut self, register: u8, value: u8) -> Result<(), HardwareError> {
        self.cs.set_low();
        let result = self.spi.write(&[register | MAX31856_WRITE, value]);
        self.cs.set_high();
        result.map(|_| ()).map_err(|e| HardwareError::new("MAX31856", e))
    }

    fn read_registers(&mut self, register: u8, buffer: &mut [u8]) -> Result<(), HardwareError> {
        let mut write = vec![0u8; buffer.len() + 1];
        let mut read = vec![0u8; buffer.len() + 1];
        write[0] = register;
        self.cs.set_low();
        let result = self.spi.transfer(&mut read, &write);
        self.cs.set_high();
        result.map_err(|e| HardwareError::new("MAX31856", e))?;
        buffer.copy_from_slice(&read[1..]);
        Ok(())
    }
}

impl ThermocoupleReader for Max31856 {
    fn read_celsius(&mut self) -> Result<f64, HardwareError> {
        // LTCBH, LTCBM, LTCBL, SR
        let mut data = [0u8; 4];
        self.read_registers(MAX31856_LTCBH, &mut data)?;
        if data[3] & MAX31856_FAULT_OPEN != 0 {
            return Err(HardwareError::new("MAX31856", "thermocouple open circuit"));
        }
        // 19-bit two's complement, left aligned in 24 bits, 0.0078125 °C/LSB
        let raw = ((data[0] as i32) << 24 | (data[1] as i32) << 16 | (data[2] as i32) << 8) >> 13;
        Ok(raw as f64 * 0.0078125)
    }
}

type Ads1115<I2C> =
    Ads1x1x<I2C, ads1x1x::ic::Ads1115, ads1x1x::ic::Resolution16Bit, ads1x1x::mode::OneShot>;

/// One single-ended ADS1115 input
pub struct Ads1115Channel<I2C> {
    adc: Ads1115<I2C>,
    channel: u8,
}

impl<I2C, E> Ads1115Channel<I2C>
where
    I2C: embedded_hal::i2c::I2c<Error = E>,
    E: std::fmt::Debug,
{
    pub fn new(i2c: I2C, channel: u8) -> Result<Self, HardwareError> {
        let mut adc = Ads1x1x::new_ads1115(i2c, TargetAddr::default());
        adc.set_full_scale_range(FullScaleRange::Within4_096V)
            .map_err(|e| HardwareError::new("ADS1115", format!("{:?}", e)))?;
        Ok(Self { adc, channel })
    }
}

impl<I2C, E> VoltageReader for Ads1115Channel<I2C>
where
    I2C: embedded_hal::i2c::I2c<Error = E>,
    E: std::fmt::Debug,
{
    fn read_volts(&mut self) -> Result<f64, HardwareError> {
        let raw = match self.channel {
            0 => block!(self.adc.read(channel::SingleA0)),
            1 => block!(self.adc.read(channel::SingleA1)),
            2 => block!(self.adc.read(channel::SingleA2)),
            _ => block!(self.adc.read(channel::SingleA3)),
        }
        .map_err(|e| HardwareError::new("ADS1115", format!("{:?}", e)))?;

        // ADS1115 is 16-bit signed, -32768 to +32767
        Ok(raw as f64 / 32768.0 * REF_VOLTAGE)
    }
}

/// Open the ADS1115 on the configured I2C device
pub fn open_ntc_adc(config: &NtcConfig) -> Result<Ads1115Channel<I2cdev>, HardwareError> {
    let i2c = I2cdev::new(&config.i2c_device)
        .map_err(|e| HardwareError::new("ADS1115", format!("{}: {:?}", config.i2c_device, e)))?;
    Ads1115Channel::new(i2c, config.channel)
}

/// H-bridge with enable, two direction inputs and an optional fan output
pub struct HBridge {
    name: &'static str,
    enable: OutputPin,
    ctrl: [OutputPin; 2],
    forward: [bool; 2],
    reverse: [bool; 2],
    fan: Option<OutputPin>,
}

impl HBridge {
    pub fn new(gpio: &Gpio, name: &'static str, config: &ActuatorConfig) -> Result<Self, HardwareError> {
        let output = |pin: u8| -> Result<OutputPin, HardwareError> {
            Ok(gpio
                .get(pin)
                .map_err(|e| HardwareError::new(name, format!("BCM {}: {}", pin, e)))?
                .into_output_low())
        };

        Ok(Self {
            name,
            enable: output(config.pwm_pin)?,
            ctrl: [output(config.ctrl_pins[0])?, output(config.ctrl_pins[1])?],
            forward: config.forward,
            reverse: config.reverse,
            fan: config.fan_pin.map(output).transpose()?,
        })
    }

    fn write_direction(&mut self, levels: [bool; 2]) {
        for (pin, level) in self.ctrl.iter_mut().zip(levels) {
            set_level(pin, level);
        }
    }
}

fn set_level(pin: &mut OutputPin, high: bool) {
    if high {
        pin.set_high();
    } else {
        pin.set_low();
    }
}

impl ActuatorDriver for HBridge {
    fn set_polarity(&mut self, polarity: Polarity) -> Result<(), HardwareError> {
        match polarity {
            Polarity::Off => self.write_direction([false, false]),
            Polarity::Forward => self.write_direction(self.forward),
            Polarity::Reverse => self.write_direction(self.reverse),
        }
        Ok(())
    }

    fn set_duty(&mut self, duty: f64) -> Result<(), HardwareError> {
        set_level(&mut self.enable, duty >= 0.5);
        Ok(())
    }

    fn set_auxiliary_duty(&mut self, duty: f64) -> Result<(), HardwareError> {
        match self.fan.as_mut() {
            Some(fan) => {
                set_level(fan, duty >= 0.5);
                Ok(())
            }
            None if duty > 0.0 => Err(HardwareError::new(self.name, "no fan output configured")),
            None => Ok(()),
        }
    }
}

/// Acquire every hardware resource of the rig
pub fn rpi_hardware(config: &RigConfig) -> Result<RigHardware, HardwareError> {
    let gpio = Gpio::new().map_err(|e| HardwareError::new("GPIO", e))?;

    let thermocouple = Max31856::new(&gpio, &config.thermocouple)?;
    let ntc_adc = open_ntc_adc(&config.ntc)?;
    let peltier = HBridge::new(&gpio, "peltier H-bridge", &config.peltier)?;
    let heater = HBridge::new(&gpio, "heater H-bridge", &config.heater)?;
    info!(
        "Hardware ready: thermocouple CS BCM {}, NTC on {} A{}",
        config.thermocouple.cs_pin, config.ntc.i2c_device, config.ntc.channel
    );

    Ok(RigHardware {
        thermocouple: Box::new(thermocouple),
        ntc_adc: Box::new(ntc_adc),
        peltier: Box::new(peltier),
        heater: Box::new(heater),
    })
}
