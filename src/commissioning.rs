//! Commissioning controller
//!
//! Drives the node from power-on to joined, one stack signal at a time:
//!
//! ```text
//! Uninitialized --SkipStartup--> Initializing
//! Initializing  --FirstStart/Reboot ok--> Steering (factory new) | Joined
//! Initializing  --FirstStart/Reboot err--> Uninitialized
//! Steering      --Steering ok--> Joined
//! Steering      --Steering err--> Steering (+ one retry after the back-off)
//! ```
//!
//! When the stack rejects the steering call outright the controller parks in
//! `SteeringFailed` and retries on the same back-off. Steering is never
//! abandoned. A retry only acts in `Steering` or `SteeringFailed`, and a
//! stack reboot voids any retry still in flight.

use std::time::Duration;

use log::{debug, error, info, warn};

use crate::driver::DeferredInit;
use crate::stack::{
    AppSignal, CommissioningMode, NetworkIdentity, SignalKind, StackError, StackHandle,
    ZigbeeStack,
};
use crate::timer::{DeferredTask, Timer};

pub const STEERING_RETRY_DELAY: Duration = Duration::from_millis(1000);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommissioningState {
    Uninitialized,
    Initializing,
    Steering,
    Joined,
    /// The stack refused to start steering; a retry is pending
    SteeringFailed,
}

pub struct Commissioning<S, T, D> {
    stack: StackHandle<S>,
    timer: T,
    drivers: D,
    retry_delay: Duration,
    state: CommissioningState,
    retry_pending: bool,
    drivers_initialized: bool,
    steering_failures: u32,
    network: Option<NetworkIdentity>,
}

impl<S, T, D> Commissioning<S, T, D>
where
    S: ZigbeeStack,
    T: Timer,
    D: DeferredInit,
{
    pub fn new(stack: StackHandle<S>, timer: T, drivers: D, retry_delay: Duration) -> Self {
        Self {
            stack,
            timer,
            drivers,
            retry_delay,
            state: CommissioningState::Uninitialized,
            retry_pending: false,
            drivers_initialized: false,
            steering_failures: 0,
            network: None,
        }
    }

    pub fn state(&self) -> CommissioningState {
        self.state
    }

    /// Network identity recorded when the node joined
    pub fn network(&self) -> Option<NetworkIdentity> {
        self.network
    }

    pub fn retry_pending(&self) -> bool {
        self.retry_pending
    }

    pub fn handle_signal(&mut self, signal: &AppSignal) {
        debug!(
            "{} ({}) in state {:?}",
            signal.kind.name(),
            signal.status,
            self.state
        );

        match signal.kind {
            SignalKind::SkipStartup => {
                info!("Initialize Zigbee stack");
                self.state = CommissioningState::Initializing;
                // A retry from before the reboot is void
                self.retry_pending = false;
                if let Err(e) = self.start(CommissioningMode::Initialization) {
                    // The stack signals again on its own schedule
                    warn!("Failed to start Zigbee commissioning: {}", e);
                }
            }
            SignalKind::DeviceFirstStart | SignalKind::DeviceReboot => {
                if signal.status.is_ok() {
                    self.on_stack_started();
                } else {
                    warn!(
                        "Failed to initialize Zigbee stack (status: {})",
                        signal.status
                    );
                    self.state = CommissioningState::Uninitialized;
                }
            }
            SignalKind::Steering => {
                if signal.status.is_ok() {
                    self.on_joined();
                } else {
                    self.steering_failures += 1;
                    info!(
                        "Network steering was not successful (status: {}, attempt {})",
                        signal.status, self.steering_failures
                    );
                    self.state = CommissioningState::Steering;
                    self.schedule_retry();
                }
            }
            SignalKind::Other(code) => {
                info!(
                    "ZDO signal: {} (0x{:x}), status: {}",
                    signal.kind.name(),
                    code,
                    signal.status
                );
            }
        }
    }

    pub fn handle_deferred(&mut self, task: DeferredTask) {
        match task {
            DeferredTask::StartCommissioning(CommissioningMode::NetworkSteering) => {
                let pending = std::mem::replace(&mut self.retry_pending, false);
                let steering = matches!(
                    self.state,
                    CommissioningState::Steering | CommissioningState::SteeringFailed
                );
                if !pending || !steering {
                    debug!("Stale steering retry in state {:?}, dropping", self.state);
                    return;
                }
                self.begin_steering();
            }
            DeferredTask::StartCommissioning(mode) => {
                if let Err(e) = self.start(mode) {
                    warn!("Failed to start Zigbee commissioning: {}", e);
                }
            }
        }
    }

    /// Wipe persisted network state. The stack reboots and signals
    /// `SkipStartup` again, so the local state is left alone.
    pub fn factory_reset(&mut self) {
        info!("Factory reset...");
        self.stack.with_lock(|stack| stack.factory_reset());
    }

    fn on_stack_started(&mut self) {
        self.init_drivers_once();

        let factory_new = self.stack.with_lock(|stack| stack.is_factory_new());
        info!(
            "Device started up in {}factory-reset mode",
            if factory_new { "" } else { "non-" }
        );

        if factory_new {
            info!("Start network steering");
            self.begin_steering();
        } else {
            info!("Device rebooted");
            self.record_network();
        }
    }

    fn init_drivers_once(&mut self) {
        if self.drivers_initialized {
            return;
        }
        self.drivers_initialized = true;

        match self.drivers.init_drivers() {
            Ok(()) => info!("Deferred driver initialization successful"),
            Err(e) => error!("Deferred driver initialization failed: {:#}", e),
        }
    }

    fn begin_steering(&mut self) {
        self.state = CommissioningState::Steering;
        if let Err(e) = self.start(CommissioningMode::NetworkSteering) {
            warn!("Failed to start network steering: {}", e);
            self.state = CommissioningState::SteeringFailed;
            self.schedule_retry();
        }
    }

    fn on_joined(&mut self) {
        let identity = self.record_network();
        info!(
            "Joined network successfully ({}) after {} failed attempt(s)",
            identity, self.steering_failures
        );
        self.steering_failures = 0;
    }

    fn record_network(&mut self) -> NetworkIdentity {
        let identity = self.stack.with_lock(|stack| stack.network_identity());
        self.network = Some(identity);
        self.state = CommissioningState::Joined;
        identity
    }

    fn schedule_retry(&mut self) {
        if self.retry_pending {
            debug!("Steering retry already pending");
            return;
        }
        self.retry_pending = true;
        self.timer.schedule_once(
            self.retry_delay,
            DeferredTask::StartCommissioning(CommissioningMode::NetworkSteering),
        );
    }

    fn start(&self, mode: CommissioningMode) -> Result<(), StackError> {
        self.stack.with_lock(|stack| stack.start_commissioning(mode))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stack::EspStatus;
    use crate::testing::{Call, MockInit, MockStack, MockTimer};

    type Controller = Commissioning<MockStack, MockTimer, MockInit>;

    fn setup(stack: MockStack) -> (Controller, StackHandle<MockStack>, MockTimer, MockInit) {
        let stack = StackHandle::new(stack);
        let timer = MockTimer::default();
        let init = MockInit::default();
        let controller = Commissioning::new(
            stack.clone(),
            timer.clone(),
            init.clone(),
            STEERING_RETRY_DELAY,
        );
        (controller, stack, timer, init)
    }

    fn steering_retry() -> (Duration, DeferredTask) {
        (
            STEERING_RETRY_DELAY,
            DeferredTask::StartCommissioning(CommissioningMode::NetworkSteering),
        )
    }

    fn calls(stack: &StackHandle<MockStack>) -> Vec<Call> {
        stack.with_lock(|s| s.calls.clone())
    }

    #[test]
    fn test_boot_to_joined() {
        let identity = NetworkIdentity {
            pan_id: 0x1a2b,
            channel: 15,
            ..Default::default()
        };
        let (mut controller, stack, timer, init) = setup(MockStack {
            identity,
            ..MockStack::factory_new()
        });

        controller.handle_signal(&AppSignal::ok(SignalKind::SkipStartup));
        assert_eq!(controller.state(), CommissioningState::Initializing);

        controller.handle_signal(&AppSignal::ok(SignalKind::DeviceFirstStart));
        assert_eq!(init.runs(), 1);
        assert_eq!(controller.state(), CommissioningState::Steering);

        controller.handle_signal(&AppSignal::failed(SignalKind::Steering, EspStatus::FAIL));
        assert_eq!(controller.state(), CommissioningState::Steering);
        assert_eq!(timer.scheduled(), vec![steering_retry()]);

        controller.handle_deferred(DeferredTask::StartCommissioning(
            CommissioningMode::NetworkSteering,
        ));
        controller.handle_signal(&AppSignal::ok(SignalKind::Steering));
        assert_eq!(controller.state(), CommissioningState::Joined);
        assert_eq!(controller.network(), Some(identity));

        assert_eq!(
            calls(&stack),
            vec![
                Call::StartCommissioning(CommissioningMode::Initialization),
                Call::StartCommissioning(CommissioningMode::NetworkSteering),
                Call::StartCommissioning(CommissioningMode::NetworkSteering),
            ]
        );
        assert!(!stack.is_locked());
    }

    #[test]
    fn test_reboot_when_not_factory_new_joins_directly() {
        let (mut controller, stack, timer, init) = setup(MockStack::default());

        controller.handle_signal(&AppSignal::ok(SignalKind::SkipStartup));
        controller.handle_signal(&AppSignal::ok(SignalKind::DeviceReboot));

        assert_eq!(controller.state(), CommissioningState::Joined);
        assert_eq!(init.runs(), 1);
        assert!(timer.scheduled().is_empty());
        assert_eq!(
            calls(&stack),
            vec![Call::StartCommissioning(CommissioningMode::Initialization)]
        );
    }

    #[test]
    fn test_failed_start_returns_to_uninitialized_without_retry() {
        let (mut controller, _stack, timer, init) = setup(MockStack::factory_new());

        controller.handle_signal(&AppSignal::ok(SignalKind::SkipStartup));
        controller.handle_signal(&AppSignal::failed(
            SignalKind::DeviceFirstStart,
            EspStatus::FAIL,
        ));

        assert_eq!(controller.state(), CommissioningState::Uninitialized);
        assert_eq!(init.runs(), 0);
        assert!(timer.scheduled().is_empty());
    }

    #[test]
    fn test_rejected_initialization_is_not_escalated() {
        let (mut controller, stack, timer, _init) = setup(MockStack {
            fail_commissioning: true,
            ..MockStack::factory_new()
        });

        controller.handle_signal(&AppSignal::ok(SignalKind::SkipStartup));

        assert_eq!(controller.state(), CommissioningState::Initializing);
        assert!(timer.scheduled().is_empty());
        assert!(!stack.is_locked());
    }

    #[test]
    fn test_driver_init_failure_does_not_block_steering() {
        let stack = StackHandle::new(MockStack::factory_new());
        let timer = MockTimer::default();
        let init = MockInit {
            fail: true,
            ..Default::default()
        };
        let mut controller =
            Commissioning::new(stack.clone(), timer, init.clone(), STEERING_RETRY_DELAY);

        controller.handle_signal(&AppSignal::ok(SignalKind::SkipStartup));
        controller.handle_signal(&AppSignal::ok(SignalKind::DeviceFirstStart));

        assert_eq!(init.runs(), 1);
        assert_eq!(controller.state(), CommissioningState::Steering);
    }

    #[test]
    fn test_drivers_initialized_exactly_once() {
        let (mut controller, _stack, _timer, init) = setup(MockStack::default());

        controller.handle_signal(&AppSignal::ok(SignalKind::DeviceFirstStart));
        controller.handle_signal(&AppSignal::ok(SignalKind::DeviceReboot));

        assert_eq!(init.runs(), 1);
    }

    #[test]
    fn test_one_retry_per_steering_failure() {
        let (mut controller, _stack, timer, _init) = setup(MockStack::factory_new());
        controller.handle_signal(&AppSignal::ok(SignalKind::DeviceFirstStart));

        for attempt in 1..=5 {
            controller.handle_signal(&AppSignal::failed(SignalKind::Steering, EspStatus::FAIL));
            assert_eq!(timer.scheduled().len(), attempt);
            assert!(controller.retry_pending());

            controller.handle_deferred(DeferredTask::StartCommissioning(
                CommissioningMode::NetworkSteering,
            ));
            assert!(!controller.retry_pending());
        }

        assert!(timer.scheduled().iter().all(|retry| *retry == steering_retry()));
    }

    #[test]
    fn test_never_more_than_one_outstanding_retry() {
        let (mut controller, _stack, timer, _init) = setup(MockStack::factory_new());
        controller.handle_signal(&AppSignal::ok(SignalKind::DeviceFirstStart));

        controller.handle_signal(&AppSignal::failed(SignalKind::Steering, EspStatus::FAIL));
        controller.handle_signal(&AppSignal::failed(SignalKind::Steering, EspStatus::TIMEOUT));

        assert_eq!(timer.scheduled(), vec![steering_retry()]);
    }

    #[test]
    fn test_steering_failures_never_leave_steering() {
        let (mut controller, stack, timer, _init) = setup(MockStack::factory_new());
        controller.handle_signal(&AppSignal::ok(SignalKind::DeviceFirstStart));

        for _ in 0..1000 {
            controller.handle_signal(&AppSignal::failed(SignalKind::Steering, EspStatus::FAIL));
            assert_eq!(controller.state(), CommissioningState::Steering);
            controller.handle_deferred(DeferredTask::StartCommissioning(
                CommissioningMode::NetworkSteering,
            ));
            assert_eq!(controller.state(), CommissioningState::Steering);
        }

        assert_eq!(timer.scheduled().len(), 1000);
        // First attempt plus one per retry
        assert_eq!(calls(&stack).len(), 1001);
    }

    #[test]
    fn test_rejected_steering_call_parks_and_retries() {
        let (mut controller, stack, timer, _init) = setup(MockStack {
            fail_commissioning: true,
            ..MockStack::factory_new()
        });

        controller.handle_signal(&AppSignal::ok(SignalKind::DeviceFirstStart));
        assert_eq!(controller.state(), CommissioningState::SteeringFailed);
        assert_eq!(timer.scheduled(), vec![steering_retry()]);

        stack.with_lock(|s| s.fail_commissioning = false);
        controller.handle_deferred(DeferredTask::StartCommissioning(
            CommissioningMode::NetworkSteering,
        ));
        assert_eq!(controller.state(), CommissioningState::Steering);
        assert_eq!(timer.scheduled().len(), 1);
    }

    #[test]
    fn test_retry_from_before_reset_is_dropped() {
        let (mut controller, stack, _timer, _init) = setup(MockStack::factory_new());
        controller.handle_signal(&AppSignal::ok(SignalKind::SkipStartup));
        controller.handle_signal(&AppSignal::ok(SignalKind::DeviceFirstStart));
        controller.handle_signal(&AppSignal::failed(SignalKind::Steering, EspStatus::FAIL));
        assert!(controller.retry_pending());

        controller.factory_reset();
        controller.handle_signal(&AppSignal::ok(SignalKind::SkipStartup));
        assert!(!controller.retry_pending());

        controller.handle_deferred(DeferredTask::StartCommissioning(
            CommissioningMode::NetworkSteering,
        ));
        assert_eq!(controller.state(), CommissioningState::Initializing);

        let steering = |calls: Vec<Call>| {
            calls
                .into_iter()
                .filter(|call| {
                    *call == Call::StartCommissioning(CommissioningMode::NetworkSteering)
                })
                .count()
        };
        assert_eq!(steering(calls(&stack)), 1);

        controller.handle_signal(&AppSignal::ok(SignalKind::DeviceFirstStart));
        assert_eq!(steering(calls(&stack)), 2);
    }

    #[test]
    fn test_retry_without_failure_is_dropped() {
        let (mut controller, stack, _timer, _init) = setup(MockStack::factory_new());
        controller.handle_signal(&AppSignal::ok(SignalKind::DeviceFirstStart));

        // Steering attempt still in flight
        controller.handle_deferred(DeferredTask::StartCommissioning(
            CommissioningMode::NetworkSteering,
        ));

        assert_eq!(calls(&stack).len(), 1);
        assert_eq!(controller.state(), CommissioningState::Steering);
    }

    #[test]
    fn test_factory_reset_in_any_state() {
        let (mut controller, stack, _timer, _init) = setup(MockStack::default());
        controller.handle_signal(&AppSignal::ok(SignalKind::SkipStartup));
        controller.handle_signal(&AppSignal::ok(SignalKind::DeviceReboot));
        assert_eq!(controller.state(), CommissioningState::Joined);

        controller.factory_reset();

        let resets = calls(&stack)
            .into_iter()
            .filter(|call| *call == Call::FactoryReset)
            .count();
        assert_eq!(resets, 1);
        assert_eq!(controller.state(), CommissioningState::Joined);
        assert!(!stack.is_locked());

        let (mut fresh, stack, _timer, _init) = setup(MockStack::default());
        fresh.factory_reset();
        assert_eq!(calls(&stack), vec![Call::FactoryReset]);
        assert_eq!(fresh.state(), CommissioningState::Uninitialized);
    }

    #[test]
    fn test_unknown_signal_changes_nothing() {
        let (mut controller, stack, timer, _init) = setup(MockStack::factory_new());
        controller.handle_signal(&AppSignal::ok(SignalKind::DeviceFirstStart));

        controller.handle_signal(&AppSignal::ok(SignalKind::Other(0x16)));
        controller.handle_signal(&AppSignal::failed(SignalKind::Other(0x04), EspStatus::FAIL));

        assert_eq!(controller.state(), CommissioningState::Steering);
        assert!(timer.scheduled().is_empty());
        assert_eq!(calls(&stack).len(), 1);
    }
}
