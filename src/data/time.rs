// Time spans in seconds, the unit of memory and horizon
// Author: Gabriel Demetrios Lafis

pub fn milliseconds(num: f64) -> f64 {
    num / 1000.0
}

pub fn seconds(num: f64) -> f64 {
    num
}

pub fn minutes(num: f64) -> f64 {
    num * 60.0
}

pub fn hours(num: f64) -> f64 {
    num * 3600.0
}

pub fn days(num: f64) -> f64 {
    num * 86400.0
}

pub fn weeks(num: f64) -> f64 {
    num * 604800.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spans() {
        assert_eq!(milliseconds(1500.0), 1.5);
        assert_eq!(hours(1.0), minutes(60.0));
        assert_eq!(weeks(1.0), days(7.0));
    }
}
