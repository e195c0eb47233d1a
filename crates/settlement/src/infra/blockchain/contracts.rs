//! Bindings for the contracts the service interacts with.

alloy::sol! {
    #[sol(rpc)]
    interface IERC20 {
        function balanceOf(address owner) external view returns (uint256);
        function decimals() external view returns (uint8);
        function allowance(address owner, address spender) external view returns (uint256);
        function approve(address spender, uint256 amount) external returns (bool);
        function transfer(address to, uint256 amount) external returns (bool);
    }

    /// Tokens that can be destroyed by their holder.
    #[sol(rpc)]
    interface IBurnable {
        function burn(uint256 amount) external;
    }

    #[sol(rpc)]
    interface IAuction {
        struct Bidder {
            address bidder;
            uint256 bidAmount;
            string fid;
        }

        struct AuctionMeta {
            address tokenAddress;
            uint256 endTime;
            address highestBidder;
            uint256 highestBid;
            bool ended;
        }

        function endAuction(uint256 auctionId) external;
        function getBidders(uint256 auctionId) external view returns (Bidder[] memory);
        function getAuctionMeta(uint256 auctionId) external view returns (AuctionMeta memory);
    }
}
