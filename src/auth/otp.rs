use rand::rngs::OsRng;
use rand::RngCore;

use crate::Result;

pub const OTP_LENGTH: usize = 6;

const OTP_MIN: u32 = 100_000;
const OTP_SPAN: u32 = 900_000;
// Largest multiple of OTP_SPAN that fits in a u32; draws at or above it are rejected.
const ACCEPT_ZONE: u32 = u32::MAX - (u32::MAX % OTP_SPAN);

/// Draws a code uniformly from 100000..=999999 using the operating system RNG.
pub fn generate_otp() -> Result<String> {
    generate_otp_with(&mut OsRng)
}

/// Same as [`generate_otp`] with a caller-supplied source. Source failures surface as errors.
pub fn generate_otp_with<R: RngCore + ?Sized>(rng: &mut R) -> Result<String> {
    loop {
        let mut buf = [0u8; 4];
        rng.try_fill_bytes(&mut buf)?;
        let draw = u32::from_le_bytes(buf);
        if draw < ACCEPT_ZONE {
            return Ok(format!("{:06}", OTP_MIN + draw % OTP_SPAN));
        }
    }
}
