//! Fixed-point money.
//!
//! Balances, stakes and payouts are held as integer hundredths so debits and
//! credits never accumulate float error. Multipliers stay `f64`; they only
//! touch money at the single point where a payout is computed.

/// Amount in hundredths of a currency unit.
pub type Amount = i64;

/// 1.00 in [`Amount`] units.
pub const AMOUNT_SCALE: Amount = 100;

/// Convert an [`Amount`] back to a decimal value.
#[inline]
pub fn from_amount(amount: Amount) -> f64 {
    amount as f64 / AMOUNT_SCALE as f64
}

/// Amount for a whole-unit stake.
#[inline]
pub fn stake_amount(stake: u64) -> Amount {
    (stake as Amount).saturating_mul(AMOUNT_SCALE)
}

/// Payout for `stake` exiting at `multiplier`.
///
/// Rounds down to the hundredth; the house never pays a fraction it does not hold.
#[inline]
pub fn payout_for(stake: u64, multiplier: f64) -> Amount {
    let raw = stake_amount(stake) as f64 * multiplier;
    // Absorb representation error so 100 x 2.00 lands on 200.00, not 199.99
    (raw + 1e-6).floor().max(0.0) as Amount
}
