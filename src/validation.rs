use crate::error::ValidationError;

pub const MIN_PASSWORD_LEN: usize = 6;
const MIN_PHONE_DIGITS: usize = 11;

/// Strip everything but ASCII digits
pub fn digits_only(value: &str) -> String {
    value.chars().filter(|c| c.is_ascii_digit()).collect()
}

fn to_digits(clean: &str) -> Vec<u32> {
    clean.chars().filter_map(|c| c.to_digit(10)).collect()
}

fn all_same(digits: &[u32]) -> bool {
    digits.windows(2).all(|pair| pair[0] == pair[1])
}

/// Check digit for a CPF prefix, weights counting down from `prefix.len() + 1`
fn cpf_check_digit(prefix: &[u32]) -> u32 {
    let top = prefix.len() as u32 + 1;
    let sum: u32 = prefix
        .iter()
        .enumerate()
        .map(|(i, d)| d * (top - i as u32))
        .sum();
    let remainder = (sum * 10) % 11;
    if remainder == 10 { 0 } else { remainder }
}

/// Validate a CPF (formatted or not), returning its 11 digits
pub fn validate_cpf(cpf: &str) -> Result<String, ValidationError> {
    let clean = digits_only(cpf);
    let digits = to_digits(&clean);

    if digits.len() != 11 || all_same(&digits) {
        return Err(ValidationError::InvalidCpf);
    }

    if cpf_check_digit(&digits[..9]) != digits[9] || cpf_check_digit(&digits[..10]) != digits[10] {
        return Err(ValidationError::InvalidCpf);
    }

    Ok(clean)
}

/// Check digit for a CNPJ prefix using the cycling 2..=9 weights
fn cnpj_check_digit(prefix: &[u32]) -> u32 {
    let sum: u32 = prefix
        .iter()
        .rev()
        .enumerate()
        .map(|(i, d)| d * (2 + (i as u32 % 8)))
        .sum();
    let remainder = sum % 11;
    if remainder < 2 { 0 } else { 11 - remainder }
}

/// Validate a CNPJ (formatted or not), returning its 14 digits
pub fn validate_cnpj(cnpj: &str) -> Result<String, ValidationError> {
    let clean = digits_only(cnpj);
    let digits = to_digits(&clean);

    if digits.len() != 14 || all_same(&digits) {
        return Err(ValidationError::InvalidCnpj);
    }

    if cnpj_check_digit(&digits[..12]) != digits[12] || cnpj_check_digit(&digits[..13]) != digits[13]
    {
        return Err(ValidationError::InvalidCnpj);
    }

    Ok(clean)
}

/// Validate a mobile phone number, returning its digits
pub fn validate_phone(phone: &str) -> Result<String, ValidationError> {
    let clean = digits_only(phone);
    if clean.len() < MIN_PHONE_DIGITS {
        return Err(ValidationError::InvalidPhone);
    }
    Ok(clean)
}

/// Basic shape check: one `@`, non-empty local part, dotted domain, no spaces
pub fn validate_email(email: &str) -> Result<String, ValidationError> {
    let email = email.trim();

    let (local, domain) = email.split_once('@').ok_or(ValidationError::InvalidEmail)?;
    let valid = !local.is_empty()
        && !domain.contains('@')
        && !email.chars().any(char::is_whitespace)
        && domain
            .split_once('.')
            .is_some_and(|(host, tld)| !host.is_empty() && !tld.is_empty() && !tld.ends_with('.'));

    if valid {
        Ok(email.to_lowercase())
    } else {
        Err(ValidationError::InvalidEmail)
    }
}

/// Usernames become part of the identity email, so keep them address-safe
pub fn validate_username(username: &str) -> Result<String, ValidationError> {
    let username = username.trim();
    if username.is_empty()
        || username.contains('@')
        || username.chars().any(char::is_whitespace)
    {
        return Err(ValidationError::InvalidUsername);
    }
    Ok(username.to_string())
}

pub fn validate_password(password: &str) -> Result<(), ValidationError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ValidationError::PasswordTooShort {
            min: MIN_PASSWORD_LEN,
        });
    }
    Ok(())
}

/// Format 11 CPF digits as `000.000.000-00`
pub fn format_cpf(cpf: &str) -> String {
    let d = digits_only(cpf);
    if d.len() != 11 {
        return d;
    }
    format!("{}.{}.{}-{}", &d[..3], &d[3..6], &d[6..9], &d[9..])
}

/// Format an 11-digit mobile number as `(00) 00000-0000`
pub fn format_phone(phone: &str) -> String {
    let d = digits_only(phone);
    if d.len() != 11 {
        return d;
    }
    format!("({}) {}-{}", &d[..2], &d[2..7], &d[7..])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cpf_with_repeated_digits_is_invalid() {
        assert_eq!(validate_cpf("111.111.111-11"), Err(ValidationError::InvalidCpf));
    }

    #[test]
    fn cpf_with_valid_check_digits_is_accepted() {
        assert_eq!(validate_cpf("529.982.247-25").unwrap(), "52998224725");
        assert_eq!(validate_cpf("11144477735").unwrap(), "11144477735");
    }

    #[test]
    fn cpf_with_wrong_length_is_invalid() {
        assert_eq!(validate_cpf("5299822472"), Err(ValidationError::InvalidCpf));
    }

    #[test]
    fn cpf_with_wrong_check_digit_is_invalid() {
        assert_eq!(validate_cpf("529.982.247-26"), Err(ValidationError::InvalidCpf));
    }

    #[test]
    fn cnpj_validation() {
        assert_eq!(validate_cnpj("11.222.333/0001-81").unwrap(), "11222333000181");
        assert_eq!(validate_cnpj("11.222.333/0001-82"), Err(ValidationError::InvalidCnpj));
        assert_eq!(validate_cnpj("00000000000000"), Err(ValidationError::InvalidCnpj));
    }

    #[test]
    fn phone_needs_eleven_digits() {
        assert_eq!(validate_phone("(11) 98765-4321").unwrap(), "11987654321");
        assert_eq!(validate_phone("(11) 8765-4321"), Err(ValidationError::InvalidPhone));
    }

    #[test]
    fn email_shape_checks() {
        assert_eq!(validate_email(" Maria@Example.com ").unwrap(), "maria@example.com");
        assert!(validate_email("maria@example").is_err());
        assert!(validate_email("@example.com").is_err());
        assert!(validate_email("maria example@x.com").is_err());
        assert!(validate_email("maria@@example.com").is_err());
    }

    #[test]
    fn username_must_be_address_safe() {
        assert_eq!(validate_username(" maria ").unwrap(), "maria");
        assert!(validate_username("").is_err());
        assert!(validate_username("ma ria").is_err());
        assert!(validate_username("maria@x").is_err());
    }

    #[test]
    fn password_minimum_length() {
        assert!(validate_password("12345").is_err());
        assert!(validate_password("123456").is_ok());
    }

    #[test]
    fn formatting_helpers() {
        assert_eq!(format_cpf("52998224725"), "529.982.247-25");
        assert_eq!(format_phone("11987654321"), "(11) 98765-4321");
        assert_eq!(format_cpf("123"), "123");
    }
}
