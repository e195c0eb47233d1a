use {
    alloy::primitives::U256,
    anyhow::{Result, ensure},
    bigdecimal::{BigDecimal, num_bigint::ToBigInt},
    num::{BigInt, BigUint, bigint::Sign},
};

pub fn u256_to_big_uint(input: &U256) -> BigUint {
    BigUint::from_bytes_be(&input.to_be_bytes::<32>())
}

pub fn u256_to_big_int(input: &U256) -> BigInt {
    BigInt::from_biguint(Sign::Plus, u256_to_big_uint(input))
}

pub fn u256_to_big_decimal(input: &U256) -> BigDecimal {
    BigDecimal::new(u256_to_big_int(input), 0)
}

pub fn big_uint_to_u256(input: &BigUint) -> Result<U256> {
    let bytes = input.to_bytes_be();
    ensure!(bytes.len() <= 32, "too large");
    Ok(U256::from_be_slice(&bytes))
}

pub fn big_int_to_u256(input: &BigInt) -> Result<U256> {
    ensure!(input.sign() != Sign::Minus, "negative");
    big_uint_to_u256(input.magnitude())
}

/// Converts an integral decimal. Returns `None` if the value has a fractional
/// part, is negative or does not fit.
pub fn big_decimal_to_u256(big_decimal: &BigDecimal) -> Option<U256> {
    if !big_decimal.is_integer() {
        return None;
    }
    big_int_to_u256(&big_decimal.to_bigint()?).ok()
}

/// Converts a decimal, dropping any fractional part.
pub fn big_decimal_to_u256_truncated(big_decimal: &BigDecimal) -> Option<U256> {
    big_decimal_to_u256(&big_decimal.with_scale(0))
}

/// Interprets `amount` as a token amount in its smallest unit and returns the
/// value in whole tokens.
pub fn atoms_to_decimal(amount: &U256, decimals: u8) -> BigDecimal {
    BigDecimal::new(u256_to_big_int(amount), i64::from(decimals))
}

/// Converts an amount of whole tokens into the token's smallest unit. Any
/// precision below one atom is truncated.
pub fn decimal_to_atoms(value: &BigDecimal, decimals: u8) -> Option<U256> {
    let scale = BigDecimal::new(BigInt::from(1), -i64::from(decimals));
    big_decimal_to_u256_truncated(&(value * scale))
}

#[cfg(test)]
mod tests {
    use {super::*, num::Zero, std::str::FromStr};

    #[test]
    fn big_uint_roundtrip_bounds() {
        assert_eq!(u256_to_big_uint(&U256::ZERO), BigUint::zero());
        assert_eq!(
            big_uint_to_u256(&u256_to_big_uint(&U256::MAX)).unwrap(),
            U256::MAX
        );
        assert!(big_uint_to_u256(&(u256_to_big_uint(&U256::MAX) + 1u8)).is_err());
    }

    #[test]
    fn negative_big_int_is_rejected() {
        assert!(big_int_to_u256(&BigInt::from(-1)).is_err());
    }

    #[test]
    fn fractional_decimal_needs_truncation() {
        let value = BigDecimal::from_str("12.75").unwrap();
        assert_eq!(big_decimal_to_u256(&value), None);
        assert_eq!(big_decimal_to_u256_truncated(&value), Some(U256::from(12)));
    }

    #[test]
    fn token_units() {
        // 1.5 USDC
        assert_eq!(
            atoms_to_decimal(&U256::from(1_500_000), 6),
            BigDecimal::from_str("1.5").unwrap()
        );
        assert_eq!(
            decimal_to_atoms(&BigDecimal::from_str("10000").unwrap(), 18),
            Some(U256::from(10_000u64) * U256::from(10u64).pow(U256::from(18)))
        );
        // sub-atom precision is dropped
        assert_eq!(
            decimal_to_atoms(&BigDecimal::from_str("0.0000015").unwrap(), 6),
            Some(U256::from(1))
        );
    }
}
