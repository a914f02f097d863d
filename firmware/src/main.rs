#![no_main]
#![no_std]

use noise_alarm_firmware as _; // Global logger and panicking behavior.

#[rtic::app(device = stm32h7xx_hal::pac, peripherals = true, dispatchers = [EXTI0])]
mod app {
    use fugit::ExtU64;
    use heapless::spsc::Queue;
    use systick_monotonic::Systick;

    use noise_alarm_control::handoff::QUEUE_CAPACITY;
    use noise_alarm_control::{
        ActuationRequest, Background, Heartbeat, LivenessReporter, Sensing, CONFIG,
    };
    use noise_alarm_firmware::led_strip::LedStrip;
    use noise_alarm_firmware::system::{Acquirer, CycleDelay, System};
    use noise_alarm_firmware::watchdog::SystemWatchdog;

    static HEARTBEAT: Heartbeat = Heartbeat::new();

    // 1 kHz granularity for task scheduling.
    #[monotonic(binds = SysTick, default = true)]
    type Mono = Systick<1000>;

    #[shared]
    struct Shared {}

    #[local]
    struct Local {
        sensing: Sensing<'static>,
        acquirer: Acquirer,
        background: Background<'static, LedStrip, SystemWatchdog>,
        delay: CycleDelay,
    }

    #[init(
        local = [
            actuation_queue: Queue<ActuationRequest, QUEUE_CAPACITY> = Queue::new(),
        ]
    )]
    fn init(cx: init::Context) -> (Shared, Local, init::Monotonics) {
        defmt::info!("Starting the firmware, initializing resources");

        let system = match System::init(cx.core, cx.device) {
            Ok(system) => system,
            Err(error) => defmt::panic!("Initialization failed: {}", error),
        };
        let mono = system.mono;

        let (producer, consumer) = cx.local.actuation_queue.split();
        let sensing = Sensing::new(&CONFIG, producer, &HEARTBEAT);
        let liveness = LivenessReporter::new(system.watchdog, CONFIG.stall_limit_ms(), 0);
        let mut background =
            Background::new(&CONFIG, system.actuator, liveness, consumer, &HEARTBEAT);

        if background.start().is_err() {
            defmt::warn!("Failed to clear the LED strip");
        }

        defmt::info!("Spawning tasks");

        sense_loop::spawn().unwrap();

        (
            Shared {},
            Local {
                sensing,
                acquirer: system.acquirer,
                background,
                delay: system.delay,
            },
            init::Monotonics(mono),
        )
    }

    #[task(local = [sensing, acquirer], priority = 2)]
    fn sense_loop(cx: sense_loop::Context) {
        // NOTE: Scheduled first so the period does not stretch with the
        // duration of the acquisition.
        sense_loop::spawn_after(u64::from(CONFIG.sampling_period_ms).millis())
            .ok()
            .unwrap();

        let sensing = cx.local.sensing;
        let acquirer = cx.local.acquirer;

        match sensing.run_cycle(acquirer) {
            Ok(report) => {
                defmt::info!(
                    "Volume={} State={}",
                    report.level.value(),
                    report.evaluation.state
                );
                if report.evaluation.changed {
                    defmt::info!(
                        "Volume={} switched the alarm to {}",
                        report.level.value(),
                        report.evaluation.state
                    );
                }
                if report.deferred {
                    defmt::warn!("Actuation queue is full, holding back the newest request");
                }
            }
            Err(fault) => defmt::warn!("Skipping cycle: {}", fault),
        }
    }

    #[idle(local = [background, delay])]
    fn idle(cx: idle::Context) -> ! {
        let background = cx.local.background;
        let delay = cx.local.delay;

        loop {
            match background.service(delay, &mut || monotonics::now().ticks()) {
                Ok(Some(request)) => defmt::debug!("Applied {}", request),
                Ok(None) => (),
                Err(_) => defmt::warn!("Failed to write the LED strip"),
            }
            cortex_m::asm::wfi();
        }
    }
}
