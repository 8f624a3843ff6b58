use embassy_stm32::gpio::Output;

use super::STAGE_CHANGED;
use crate::stage::FIRMWARE_PLAN;
use crate::status;

/// Toggles the status LED on every stage transition within a running period.
#[embassy_executor::task]
pub async fn run(mut led: Output<'static>) -> ! {
    loop {
        let index = STAGE_CHANGED.wait().await;
        if !status::period_running() {
            continue;
        }
        led.toggle();

        let label = FIRMWARE_PLAN
            .stages
            .get(usize::from(index))
            .map_or("unknown", |stage| stage.label);
        defmt::info!("stage {=u8} ({=str}) active", index, label);
    }
}
