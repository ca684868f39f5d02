mod load_dotenv;
mod retry_schedule;
mod time;

pub use load_dotenv::load_dotenv;
pub use retry_schedule::RetrySchedule;
pub use time::now_epoch;

pub mod base_path;

pub fn rand_hex(bytes: usize) -> String {
    let rand: Vec<u8> = (0..bytes).map(|_| rand::random::<u8>()).collect();
    hex::encode(rand)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rand_hex_length() {
        assert_eq!(rand_hex(3).len(), 6);
        assert!(rand_hex(4).chars().all(|c| c.is_ascii_hexdigit()));
    }
}
