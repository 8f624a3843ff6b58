use cortex_m::interrupt;
use cortex_m::register::primask;
use critical_section::{self, RawRestoreState};
use defmt_rtt as _;
use embassy_executor::Spawner;
use embassy_stm32 as hal;
use embassy_stm32::gpio::{Level, Output, Speed};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;

use crate::stage::{self, FIRMWARE_PLAN};
use crate::status;

mod auton_task;
mod indicator_task;

critical_section::set_impl!(InterruptCriticalSection);

struct InterruptCriticalSection;

unsafe impl critical_section::Impl for InterruptCriticalSection {
    unsafe fn acquire() -> RawRestoreState {
        let primask = primask::read();
        interrupt::disable();
        primask.is_active()
    }

    unsafe fn release(restore_state: RawRestoreState) {
        if restore_state {
            unsafe {
                interrupt::enable();
            }
        }
    }
}

/// Raised with the stage index whenever a different stage takes over.
pub(super) static STAGE_CHANGED: Signal<CriticalSectionRawMutex, u8> = Signal::new();

fn notify_stage(index: u8) {
    if status::record_stage(index) {
        STAGE_CHANGED.signal(index);
    }
}

#[embassy_executor::main]
pub async fn main(spawner: Spawner) {
    let config = hal::Config::default();
    let hal::Peripherals { PA5, .. } = hal::init(config);

    let led = Output::new(PA5, Level::Low, Speed::Low);
    let scheduler =
        stage::build_scheduler(FIRMWARE_PLAN, notify_stage).expect("firmware plan registration");

    spawner
        .spawn(auton_task::run(scheduler))
        .expect("failed to spawn autonomous task");

    spawner
        .spawn(indicator_task::run(led))
        .expect("failed to spawn indicator task");

    core::future::pending::<()>().await;
}
