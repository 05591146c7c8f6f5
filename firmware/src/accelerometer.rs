use embassy_time::{Duration, Timer};
use embedded_hal_async::i2c::I2c;
use log::info;
use micromath::vector::F32x3;

const EARTH_GRAVITY: f32 = 9.80665;
// ACCEL_FS_SEL = 0 after reset: +-2 g.
const LSB_PER_G: f32 = 16384.0;

pub const ICM20948_ADDR: u8 = 0x69;
const WHO_AM_I_VAL: u8 = 0xEA;

// User bank 0
const REG_WHO_AM_I: u8 = 0x00;
const REG_PWR_MGMT_1: u8 = 0x06;
const REG_PWR_MGMT_2: u8 = 0x07;
const REG_ACCEL_XOUT_H: u8 = 0x2D;
const REG_BANK_SEL: u8 = 0x7F;

const PWR_RESET: u8 = 0x80;
const PWR_AUTO_CLOCK: u8 = 0x01;

#[derive(Debug)]
pub enum ImuError<E> {
    I2c(E),
    UnexpectedDevice(u8),
}

/// ICM-20948 accelerometer half, read over async I2C.
pub struct Icm20948<I2C> {
    i2c: I2C,
    address: u8,
}

impl<I2C> Icm20948<I2C>
where
    I2C: I2c,
{
    pub async fn new(i2c: I2C, address: u8) -> Result<Self, ImuError<I2C::Error>> {
        let mut imu = Self { i2c, address };
        imu.write_reg(REG_BANK_SEL, 0x00)
            .await
            .map_err(ImuError::I2c)?;

        let id = imu.read_reg(REG_WHO_AM_I).await.map_err(ImuError::I2c)?;
        if id != WHO_AM_I_VAL {
            return Err(ImuError::UnexpectedDevice(id));
        }

        imu.power_on().await.map_err(ImuError::I2c)?;
        info!("ICM-20948 ready at {:#04x}", address);
        Ok(imu)
    }

    pub async fn get_accel_raw(&mut self) -> Result<(i16, i16, i16), I2C::Error> {
        let mut rx_buf = [0u8; 6];
        self.i2c
            .write_read(self.address, &[REG_ACCEL_XOUT_H], &mut rx_buf)
            .await?;

        let x = i16::from_be_bytes([rx_buf[0], rx_buf[1]]);
        let y = i16::from_be_bytes([rx_buf[2], rx_buf[3]]);
        let z = i16::from_be_bytes([rx_buf[4], rx_buf[5]]);

        Ok((x, y, z))
    }

    /// Acceleration in m/s².
    pub async fn get_accel(&mut self) -> Result<F32x3, I2C::Error> {
        let (x, y, z) = self.get_accel_raw().await?;
        let scale = EARTH_GRAVITY / LSB_PER_G;

        Ok(F32x3 {
            x: x as f32 * scale,
            y: y as f32 * scale,
            z: z as f32 * scale,
        })
    }

    async fn power_on(&mut self) -> Result<(), I2C::Error> {
        self.write_reg(REG_PWR_MGMT_1, PWR_RESET).await?;
        Timer::after(Duration::from_millis(10)).await;

        self.write_reg(REG_PWR_MGMT_1, PWR_AUTO_CLOCK).await?;
        // Accelerometer and gyro axes all on.
        self.write_reg(REG_PWR_MGMT_2, 0x00).await?;
        Timer::after(Duration::from_millis(20)).await;

        Ok(())
    }

    async fn write_reg(&mut self, reg: u8, value: u8) -> Result<(), I2C::Error> {
        self.i2c.write(self.address, &[reg, value]).await
    }

    async fn read_reg(&mut self, reg: u8) -> Result<u8, I2C::Error> {
        let mut rx_buf = [0u8; 1];
        self.i2c.write_read(self.address, &[reg], &mut rx_buf).await?;
        Ok(rx_buf[0])
    }
}
