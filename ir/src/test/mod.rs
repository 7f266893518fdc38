pub mod property;

#[cfg(test)]
mod unit;
