// This file is only compiled during tests

use std::cell::RefCell;
use std::collections::HashMap;

use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    Pwm0,
    Pwm1,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Polarity {
    Normal,
}

thread_local! {
    static MOCK_PWM_DUTY: RefCell<HashMap<Channel, f64>> = RefCell::new(HashMap::new());
    static MOCK_PWM_ENABLED: RefCell<HashMap<Channel, bool>> = RefCell::new(HashMap::new());
}

pub struct Pwm {
    channel: Channel,
}

impl Pwm {
    pub fn with_frequency(
        channel: Channel,
        _frequency: f64,
        duty_cycle: f64,
        _polarity: Polarity,
        enabled: bool,
    ) -> Result<Self> {
        MOCK_PWM_DUTY.with(|duty| duty.borrow_mut().insert(channel, duty_cycle));
        MOCK_PWM_ENABLED.with(|en| en.borrow_mut().insert(channel, enabled));
        Ok(Pwm { channel })
    }

    pub fn set_duty_cycle(&self, duty_cycle: f64) -> Result<()> {
        MOCK_PWM_DUTY.with(|duty| {
            duty.borrow_mut().insert(self.channel, duty_cycle);
        });
        log::trace!("[Mock PWM {:?}] Duty cycle set to {:.4}", self.channel, duty_cycle);
        Ok(())
    }

    pub fn disable(&self) -> Result<()> {
        MOCK_PWM_ENABLED.with(|en| en.borrow_mut().insert(self.channel, false));
        log::trace!("[Mock PWM {:?}] Disabled", self.channel);
        Ok(())
    }
}

// Test helpers
pub fn get_mock_duty_cycle(channel: Channel) -> Option<f64> {
    MOCK_PWM_DUTY.with(|duty| duty.borrow().get(&channel).copied())
}

pub fn is_mock_enabled(channel: Channel) -> bool {
    MOCK_PWM_ENABLED.with(|en| en.borrow().get(&channel).copied().unwrap_or(false))
}
