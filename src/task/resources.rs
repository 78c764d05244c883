use assign_resources::assign_resources;
use embassy_rp::i2c::InterruptHandler as I2cInterruptHandler;
use embassy_rp::peripherals::I2C0;
use embassy_rp::peripherals::UART0;
use embassy_rp::uart::BufferedInterruptHandler;
use embassy_rp::{bind_interrupts, peripherals, Peri};

// group the peripherals into resources, to be used in the tasks
// the resources are assigned to the tasks in main.rs
assign_resources! {
    btn_start_stop: StartStopButtonResources {
        button_pin: PIN_16,
    },
    btn_silence: SilenceButtonResources {
        button_pin: PIN_17,
    },
    btn_interval: IntervalButtonResources {
        button_pin: PIN_18,
    },
    btn_reset: ResetButtonResources {
        button_pin: PIN_19,
    },
    converters: ConverterResources {
        spi: SPI0,
        clk_pin: PIN_2,
        mosi_pin: PIN_3,
        miso_pin: PIN_4,
        adc_cs_pin: PIN_5,
        dac_cs_pin: PIN_6,
    },
    rtc: RtcResources {
        i2c1: I2C1,
        scl_pin: PIN_15,
        sda_pin: PIN_14,
    },
    display: DisplayResources {
        scl: PIN_13,
        sda: PIN_12,
        i2c0: I2C0,
    },
    buzzer: BuzzerResources {
        pwm_slice: PWM_SLICE6,
        buzzer_pin: PIN_28,
        indicator_pin: PIN_25, // onboard LED doubles as the alarm indicator
    },
    uplink: UplinkResources {
        uart: UART0,
        tx_pin: PIN_0,
        rx_pin: PIN_1,
    },
    watchdog: WatchdogResources {
        watchdog: WATCHDOG,
    },
}

// bind the interrupts, on a global scope, until i find a better way
bind_interrupts!(pub struct Irqs {
    I2C0_IRQ => I2cInterruptHandler<I2C0>;
    UART0_IRQ => BufferedInterruptHandler<UART0>;
});
